use thiserror::Error;

/// Reconciliation failure. Always caught and logged by the caller; the
/// proxied action's outcome is independent of it.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("mirror store error: {0}")]
    Store(String),
}
