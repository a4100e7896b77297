//! API key model and validation.
//!
//! Keys use the prefix `helios_` followed by an environment segment and a
//! random suffix (e.g. `helios_live_...`). Only the SHA-256 hash of the full
//! key is stored; lookup is by hash.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use helios_core::{ApiKeyId, OrganizationId};

use crate::error::AuthError;

/// Prefix every Helios API key carries.
pub const API_KEY_PREFIX: &str = "helios_";

/// Kind of an API key. Vendor keys carry per-request actor attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyKind {
    Service,
    Vendor,
}

/// Check whether a token looks like a Helios API key.
pub fn is_api_key(token: &str) -> bool {
    token.starts_with(API_KEY_PREFIX) && token.len() > API_KEY_PREFIX.len()
}

/// Compute the SHA-256 hash of an API key for store lookup.
///
/// Plain SHA-256 is acceptable: keys are high-entropy random strings, so
/// pre-computation attacks are infeasible without a salt.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// A stored API key (hash only; the raw key is shown once at creation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub kind: ApiKeyKind,
    pub key_hash: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    /// Source IPs allowed to use this key. Empty means unrestricted.
    pub allowed_ips: Vec<IpAddr>,
    /// Whether vendor requests must carry actor attribution headers.
    pub require_actor: bool,
    /// Approved operator emails for vendor keys. Empty means any.
    pub approved_actor_emails: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Validate key state against the request.
    ///
    /// Checks active flag, expiry, and the source-IP allow list (when
    /// configured). Attribution requirements are enforced by the resolver
    /// since they depend on request headers.
    pub fn check(&self, now: DateTime<Utc>, source_ip: Option<IpAddr>) -> Result<(), AuthError> {
        if !self.is_active {
            return Err(AuthError::Revoked);
        }

        if let Some(expires_at) = self.expires_at {
            if now > expires_at {
                return Err(AuthError::Expired);
            }
        }

        if !self.allowed_ips.is_empty() {
            match source_ip {
                Some(ip) if self.allowed_ips.contains(&ip) => {}
                _ => return Err(AuthError::IpNotWhitelisted),
            }
        }

        Ok(())
    }
}
