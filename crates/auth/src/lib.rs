//! `helios-auth` — request authentication and actor attribution.
//!
//! Turns raw request credentials (API key header or bearer session token)
//! into a typed [`ActorContext`]. Storage is abstracted behind
//! [`ApiKeyStore`]; HTTP concerns stay in the api crate.

pub mod actor;
pub mod api_key;
pub mod claims;
pub mod error;
pub mod resolver;
pub mod store;

pub use actor::{ActorContext, ActorType, VendorAttribution};
pub use api_key::{API_KEY_PREFIX, ApiKey, ApiKeyKind, hash_api_key, is_api_key};
pub use claims::{Hs256JwtValidator, JwtValidator, SessionClaims, validate_claims};
pub use error::AuthError;
pub use resolver::{ActorResolver, RequestEvidence};
pub use store::{ApiKeyStore, InMemoryApiKeyStore};
