use thiserror::Error;

/// Dispatch failure: the provider could not be reached at all.
///
/// A non-2xx provider response is not an error here; it is passed through
/// to the caller verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("provider request timed out")]
    Timeout,

    #[error("provider transport failure: {0}")]
    Transport(String),
}
