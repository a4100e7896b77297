use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use helios_core::ApiKeyId;

use crate::api_key::ApiKey;
use crate::error::AuthError;

/// Lookup and usage-tracking surface for stored API keys.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Find a key by the SHA-256 hash of its raw value.
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AuthError>;

    /// Record that the key was used. Best-effort; callers must not let a
    /// failure here affect the request.
    async fn touch_last_used(&self, id: ApiKeyId, at: DateTime<Utc>) -> Result<(), AuthError>;
}

/// In-memory key store (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    keys: RwLock<HashMap<String, ApiKey>>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: ApiKey) {
        self.keys
            .write()
            .unwrap()
            .insert(key.key_hash.clone(), key);
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryApiKeyStore {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AuthError> {
        Ok(self.keys.read().unwrap().get(key_hash).cloned())
    }

    async fn touch_last_used(&self, id: ApiKeyId, at: DateTime<Utc>) -> Result<(), AuthError> {
        let mut keys = self.keys.write().unwrap();
        for key in keys.values_mut() {
            if key.id == id {
                key.last_used_at = Some(at);
                return Ok(());
            }
        }
        Ok(())
    }
}
