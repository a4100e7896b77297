//! `helios-sync` — mirror reconciliation for directory state.
//!
//! Applies the provider's response back onto the local mirror: creates and
//! updates upsert idempotently, deletions tombstone, list pages bulk-upsert.
//! Reconciliation is best-effort and never fails the proxied call.

pub mod error;
pub mod matcher;
pub mod mirror;
pub mod reconciler;
pub mod store;

pub use error::SyncError;
pub use matcher::{ResourceMatch, ResourceMatcher, resolve_resource};
pub use mirror::{MirrorRecord, MirrorStatus, MirrorUpsert, ResourceType};
pub use reconciler::{Reconciler, SyncOutcome, SyncRequest};
pub use store::{InMemoryMirrorStore, MirrorStore};
