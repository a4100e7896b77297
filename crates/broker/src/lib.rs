//! `helios-broker` — per-organization credential brokering.
//!
//! Exchanges an organization's vaulted secret bundle for a short-lived
//! bearer token, caching tokens per credential identity and refreshing
//! before use whenever less than the safety margin remains.

pub mod broker;
pub mod cache;
pub mod credential;
pub mod error;

pub use broker::{TokenBroker, TokenExchange};
pub use cache::{CacheKey, InMemoryTokenCache, TokenCache, TokenCacheEntry};
pub use credential::{Credential, CredentialVault, InMemoryCredentialVault};
pub use error::BrokerError;
