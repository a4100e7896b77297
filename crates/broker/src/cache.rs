//! Shared token cache, injected into the broker once per process.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use helios_core::OrganizationId;

/// Cache key: one slot per (organization, credential identity).
///
/// Keying on the credential identity means a rotated credential never
/// reuses the previous credential's token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub organization_id: OrganizationId,
    pub client_id: String,
}

/// A cached bearer token with its expiry.
#[derive(Debug, Clone)]
pub struct TokenCacheEntry {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenCacheEntry {
    /// Usable only while more than the safety margin remains before expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

/// Process-wide token cache.
pub trait TokenCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<TokenCacheEntry>;
    fn set(&self, key: CacheKey, entry: TokenCacheEntry);
}

/// In-memory token cache.
#[derive(Debug, Default)]
pub struct InMemoryTokenCache {
    entries: RwLock<HashMap<CacheKey, TokenCacheEntry>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenCache for InMemoryTokenCache {
    fn get(&self, key: &CacheKey) -> Option<TokenCacheEntry> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: CacheKey, entry: TokenCacheEntry) {
        self.entries.write().unwrap().insert(key, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_freshness_honors_margin() {
        let now = Utc::now();
        let entry = TokenCacheEntry {
            access_token: "t".to_string(),
            expires_at: now + Duration::minutes(10),
        };

        assert!(entry.is_fresh(now, Duration::minutes(5)));
        assert!(!entry.is_fresh(now, Duration::minutes(15)));
    }

    #[test]
    fn already_expired_entry_is_never_fresh() {
        let now = Utc::now();
        let entry = TokenCacheEntry {
            access_token: "t".to_string(),
            expires_at: now - Duration::minutes(1),
        };

        assert!(!entry.is_fresh(now, Duration::zero()));
    }

    #[test]
    fn cache_round_trip_and_overwrite() {
        let cache = InMemoryTokenCache::new();
        let key = CacheKey {
            organization_id: OrganizationId::new(),
            client_id: "client-1".to_string(),
        };

        assert!(cache.get(&key).is_none());

        let now = Utc::now();
        cache.set(
            key.clone(),
            TokenCacheEntry {
                access_token: "first".to_string(),
                expires_at: now + Duration::hours(1),
            },
        );
        assert_eq!(cache.get(&key).unwrap().access_token, "first");

        cache.set(
            key.clone(),
            TokenCacheEntry {
                access_token: "second".to_string(),
                expires_at: now + Duration::hours(1),
            },
        );
        assert_eq!(cache.get(&key).unwrap().access_token, "second");
    }
}
