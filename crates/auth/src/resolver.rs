//! Actor resolution: raw request evidence → typed [`ActorContext`].

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::actor::{ActorContext, VendorAttribution};
use crate::api_key::{ApiKey, ApiKeyKind, hash_api_key, is_api_key};
use crate::claims::JwtValidator;
use crate::error::AuthError;
use crate::store::ApiKeyStore;

/// Timeout for the async last-used update, so it cannot hang through a
/// graceful shutdown.
const LAST_USED_UPDATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw authentication evidence extracted from a request.
#[derive(Debug, Clone, Default)]
pub struct RequestEvidence {
    /// Value of the `X-API-Key` header.
    pub api_key: Option<String>,
    /// Bearer token from the `Authorization` header.
    pub bearer: Option<String>,
    pub source_ip: Option<IpAddr>,
    /// `X-Actor-Name` header (vendor attribution).
    pub actor_name: Option<String>,
    /// `X-Actor-Email` header (vendor attribution).
    pub actor_email: Option<String>,
    /// `X-Actor-Id` header (vendor attribution, optional).
    pub actor_id: Option<String>,
    /// `X-Client-Reference` header (vendor ticket reference, optional).
    pub client_reference: Option<String>,
}

/// Resolves request evidence into an [`ActorContext`].
///
/// Evaluation order: an API key header, when present, always wins; otherwise
/// the bearer token is validated as a session.
pub struct ActorResolver {
    keys: Arc<dyn ApiKeyStore>,
    sessions: Arc<dyn JwtValidator>,
}

impl ActorResolver {
    pub fn new(keys: Arc<dyn ApiKeyStore>, sessions: Arc<dyn JwtValidator>) -> Self {
        Self { keys, sessions }
    }

    pub async fn resolve(
        &self,
        evidence: &RequestEvidence,
        now: DateTime<Utc>,
    ) -> Result<ActorContext, AuthError> {
        if let Some(raw) = &evidence.api_key {
            return self.resolve_api_key(raw, evidence, now).await;
        }

        if let Some(token) = &evidence.bearer {
            return self.resolve_session(token, now);
        }

        Err(AuthError::MissingCredentials)
    }

    async fn resolve_api_key(
        &self,
        raw: &str,
        evidence: &RequestEvidence,
        now: DateTime<Utc>,
    ) -> Result<ActorContext, AuthError> {
        if !is_api_key(raw) {
            return Err(AuthError::InvalidFormat);
        }

        let key = self
            .keys
            .find_by_hash(&hash_api_key(raw))
            .await?
            .ok_or(AuthError::NotFound)?;

        key.check(now, evidence.source_ip)?;

        let context = match key.kind {
            ApiKeyKind::Service => ActorContext::ServiceKey {
                key_id: key.id,
                key_name: key.name.clone(),
                organization_id: key.organization_id,
            },
            ApiKeyKind::Vendor => ActorContext::VendorKey {
                key_id: key.id,
                key_name: key.name.clone(),
                organization_id: key.organization_id,
                attribution: vendor_attribution(&key, evidence)?,
            },
        };

        self.spawn_touch(&key, now);

        Ok(context)
    }

    fn resolve_session(&self, token: &str, now: DateTime<Utc>) -> Result<ActorContext, AuthError> {
        let claims = self.sessions.validate(token, now)?;
        Ok(ActorContext::User {
            user_id: claims.sub,
            email: claims.email,
            organization_id: claims.organization_id,
        })
    }

    /// Touch the key's last-used timestamp off the request path.
    fn spawn_touch(&self, key: &ApiKey, now: DateTime<Utc>) {
        let keys = self.keys.clone();
        let key_id = key.id;
        tokio::spawn(async move {
            match tokio::time::timeout(
                LAST_USED_UPDATE_TIMEOUT,
                keys.touch_last_used(key_id, now),
            )
            .await
            {
                Ok(Ok(())) => {
                    tracing::debug!(key_id = %key_id, "updated api key last_used_at");
                }
                Ok(Err(e)) => {
                    tracing::warn!(key_id = %key_id, error = %e, "failed to update api key last_used_at");
                }
                Err(_) => {
                    tracing::warn!(key_id = %key_id, "api key last_used_at update timed out");
                }
            }
        });
    }
}

/// Build vendor attribution from headers, enforcing the key's policy.
fn vendor_attribution(
    key: &ApiKey,
    evidence: &RequestEvidence,
) -> Result<VendorAttribution, AuthError> {
    let (name, email) = match (&evidence.actor_name, &evidence.actor_email) {
        (Some(name), Some(email)) if !name.is_empty() && !email.is_empty() => {
            (name.clone(), email.clone())
        }
        _ if !key.require_actor => (key.name.clone(), String::new()),
        _ => return Err(AuthError::ActorRequired),
    };

    if !key.approved_actor_emails.is_empty() {
        let approved = key
            .approved_actor_emails
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&email));
        if !approved {
            return Err(AuthError::ActorNotApproved);
        }
    }

    Ok(VendorAttribution {
        name,
        email,
        actor_id: evidence.actor_id.clone(),
        client_reference: evidence.client_reference.clone(),
    })
}
