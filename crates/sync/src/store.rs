use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use helios_core::{MirrorRecordId, OrganizationId};

use crate::error::SyncError;
use crate::mirror::{MirrorRecord, MirrorStatus, MirrorUpsert, ResourceType};

/// Mirror persistence surface.
///
/// Implementations must make `upsert`/`partial_upsert` idempotent on
/// (organization, resource type, external id) — the relational adapter
/// relies on the store's native insert-or-update primitive.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Full upsert: the provider value wins over local state. Revives a
    /// tombstoned record, since the provider says the entity exists.
    async fn upsert(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        upsert: MirrorUpsert,
        now: DateTime<Utc>,
    ) -> Result<MirrorRecord, SyncError>;

    /// Partial upsert: only provided fields overwrite; missing fields
    /// retain their prior value. Attribute objects merge shallowly.
    async fn partial_upsert(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        upsert: MirrorUpsert,
        now: DateTime<Utc>,
    ) -> Result<MirrorRecord, SyncError>;

    /// Soft-delete: set `deleted_at` and mark the record deleted.
    async fn tombstone(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MirrorRecord>, SyncError>;

    async fn get(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        external_id: &str,
    ) -> Result<Option<MirrorRecord>, SyncError>;

    async fn list_active(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
    ) -> Result<Vec<MirrorRecord>, SyncError>;
}

type MirrorKey = (OrganizationId, ResourceType, String);

/// In-memory mirror store (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryMirrorStore {
    records: RwLock<HashMap<MirrorKey, MirrorRecord>>,
}

impl InMemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Shallow merge of attribute objects; non-object payloads replace.
fn merge_attributes(existing: &JsonValue, incoming: &JsonValue) -> JsonValue {
    match (existing, incoming) {
        (JsonValue::Object(old), JsonValue::Object(new)) => {
            let mut merged = old.clone();
            for (k, v) in new {
                merged.insert(k.clone(), v.clone());
            }
            JsonValue::Object(merged)
        }
        _ => incoming.clone(),
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirrorStore {
    async fn upsert(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        upsert: MirrorUpsert,
        now: DateTime<Utc>,
    ) -> Result<MirrorRecord, SyncError> {
        let key = (organization_id, resource_type, upsert.external_id.clone());
        let mut records = self.records.write().unwrap();

        let record = match records.get(&key) {
            Some(existing) => MirrorRecord {
                id: existing.id,
                organization_id,
                resource_type,
                external_id: upsert.external_id,
                email: upsert.email,
                display_name: upsert.display_name,
                attributes: upsert.attributes,
                status: MirrorStatus::Active,
                created_at: existing.created_at,
                updated_at: now,
                deleted_at: None,
            },
            None => MirrorRecord {
                id: MirrorRecordId::new(),
                organization_id,
                resource_type,
                external_id: upsert.external_id,
                email: upsert.email,
                display_name: upsert.display_name,
                attributes: upsert.attributes,
                status: MirrorStatus::Active,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        };

        records.insert(key, record.clone());
        Ok(record)
    }

    async fn partial_upsert(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        upsert: MirrorUpsert,
        now: DateTime<Utc>,
    ) -> Result<MirrorRecord, SyncError> {
        let key = (organization_id, resource_type, upsert.external_id.clone());
        let mut records = self.records.write().unwrap();

        let record = match records.get(&key) {
            Some(existing) => MirrorRecord {
                id: existing.id,
                organization_id,
                resource_type,
                external_id: upsert.external_id,
                email: upsert.email.or_else(|| existing.email.clone()),
                display_name: upsert
                    .display_name
                    .or_else(|| existing.display_name.clone()),
                attributes: merge_attributes(&existing.attributes, &upsert.attributes),
                status: existing.status,
                created_at: existing.created_at,
                updated_at: now,
                deleted_at: existing.deleted_at,
            },
            None => MirrorRecord {
                id: MirrorRecordId::new(),
                organization_id,
                resource_type,
                external_id: upsert.external_id,
                email: upsert.email,
                display_name: upsert.display_name,
                attributes: upsert.attributes,
                status: MirrorStatus::Active,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        };

        records.insert(key, record.clone());
        Ok(record)
    }

    async fn tombstone(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MirrorRecord>, SyncError> {
        let key = (organization_id, resource_type, external_id.to_string());
        let mut records = self.records.write().unwrap();

        match records.get_mut(&key) {
            Some(record) => {
                record.status = MirrorStatus::Deleted;
                record.deleted_at = Some(now);
                record.updated_at = now;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn get(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        external_id: &str,
    ) -> Result<Option<MirrorRecord>, SyncError> {
        let key = (organization_id, resource_type, external_id.to_string());
        Ok(self.records.read().unwrap().get(&key).cloned())
    }

    async fn list_active(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
    ) -> Result<Vec<MirrorRecord>, SyncError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|r| {
                r.organization_id == organization_id
                    && r.resource_type == resource_type
                    && r.is_active()
            })
            .cloned()
            .collect())
    }
}
