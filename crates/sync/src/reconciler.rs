//! Reconciliation rules: provider response → mirror mutation.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::debug;

use helios_core::OrganizationId;

use crate::error::SyncError;
use crate::matcher::{ResourceMatcher, resolve_resource};
use crate::mirror::{MirrorUpsert, ResourceType};
use crate::store::MirrorStore;

/// Keys under which providers page collection items.
const PAGE_ITEM_KEYS: &[&str] = &["users", "groups", "organizationUnits", "value", "items"];

/// A completed proxy call to reconcile.
#[derive(Debug)]
pub struct SyncRequest<'a> {
    pub organization_id: OrganizationId,
    /// Uppercase HTTP verb of the proxied call.
    pub method: &'a str,
    /// Provider-relative path of the proxied call.
    pub path: &'a str,
    /// The provider's response body.
    pub response: &'a JsonValue,
    /// The provider's matcher registry.
    pub matchers: &'a [ResourceMatcher],
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub resource_type: Option<ResourceType>,
    /// Number of mirror records written.
    pub applied: usize,
}

/// Applies provider responses onto the mirror store.
pub struct Reconciler {
    store: Arc<dyn MirrorStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn MirrorStore>) -> Self {
        Self { store }
    }

    /// Apply one rule based on verb and matched resource type.
    ///
    /// Unknown resource types are skipped silently (debug log only).
    pub async fn reconcile(&self, request: &SyncRequest<'_>) -> Result<SyncOutcome, SyncError> {
        let Some(matched) = resolve_resource(request.matchers, request.path) else {
            debug!(path = %request.path, "no resource matcher; skipping reconciliation");
            return Ok(SyncOutcome::default());
        };

        let resource_type = matched.resource_type;
        let now = Utc::now();
        let mut outcome = SyncOutcome {
            resource_type: Some(resource_type),
            applied: 0,
        };

        match request.method {
            "POST" => {
                let Some(upsert) = extract_upsert(request.response, None) else {
                    debug!(path = %request.path, "create response carries no id; skipping");
                    return Ok(outcome);
                };
                self.store
                    .upsert(request.organization_id, resource_type, upsert, now)
                    .await?;
                outcome.applied = 1;
            }
            "PUT" | "PATCH" => {
                let Some(upsert) = extract_upsert(request.response, matched.trailing_id.as_deref())
                else {
                    debug!(path = %request.path, "update response carries no id; skipping");
                    return Ok(outcome);
                };
                self.store
                    .partial_upsert(request.organization_id, resource_type, upsert, now)
                    .await?;
                outcome.applied = 1;
            }
            "DELETE" => {
                let Some(external_id) = matched.trailing_id else {
                    debug!(path = %request.path, "delete without entity id; skipping");
                    return Ok(outcome);
                };
                let tombstoned = self
                    .store
                    .tombstone(request.organization_id, resource_type, &external_id, now)
                    .await?;
                if tombstoned.is_some() {
                    outcome.applied = 1;
                }
            }
            "GET" => {
                let Some(items) = extract_page_items(request.response) else {
                    debug!(path = %request.path, "response is not a collection page; skipping");
                    return Ok(outcome);
                };
                // Absence from a page never tombstones; pages only add.
                for item in items {
                    if let Some(upsert) = extract_upsert(item, None) {
                        self.store
                            .upsert(request.organization_id, resource_type, upsert, now)
                            .await?;
                        outcome.applied += 1;
                    }
                }
            }
            other => {
                debug!(method = other, "verb not reconciled");
            }
        }

        Ok(outcome)
    }
}

/// Pull the mirror fields out of a provider entity payload.
///
/// The external id comes from the payload's `id`, falling back to the
/// path's entity segment for update responses that omit it.
fn extract_upsert(entity: &JsonValue, path_id: Option<&str>) -> Option<MirrorUpsert> {
    let external_id = entity
        .get("id")
        .and_then(value_as_id)
        .or_else(|| path_id.map(str::to_string))?;

    Some(MirrorUpsert {
        external_id,
        email: extract_email(entity),
        display_name: extract_display_name(entity),
        attributes: entity.clone(),
    })
}

fn value_as_id(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_email(entity: &JsonValue) -> Option<String> {
    ["primaryEmail", "mail", "userPrincipalName", "email"]
        .iter()
        .find_map(|key| entity.get(key).and_then(JsonValue::as_str))
        .map(str::to_string)
}

fn extract_display_name(entity: &JsonValue) -> Option<String> {
    entity
        .pointer("/name/fullName")
        .and_then(JsonValue::as_str)
        .or_else(|| entity.get("displayName").and_then(JsonValue::as_str))
        .or_else(|| entity.get("name").and_then(JsonValue::as_str))
        .map(str::to_string)
}

fn extract_page_items(body: &JsonValue) -> Option<&Vec<JsonValue>> {
    PAGE_ITEM_KEYS
        .iter()
        .find_map(|key| body.get(key).and_then(JsonValue::as_array))
}
