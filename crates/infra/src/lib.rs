//! Infrastructure layer: Postgres adapters for the domain store traits.
//!
//! Each adapter wraps a shared [`sqlx::PgPool`] and maps rows to domain
//! types. Schema migrations are managed outside this crate; each module
//! documents the table shape it expects.

pub mod api_keys;
pub mod ledger_store;
pub mod mirror_store;
pub mod vault;

pub use api_keys::PostgresApiKeyStore;
pub use ledger_store::PostgresLedgerStore;
pub use mirror_store::PostgresMirrorStore;
pub use vault::PostgresCredentialVault;
