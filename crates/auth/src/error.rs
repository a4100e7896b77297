use thiserror::Error;

/// Authentication failure.
///
/// Every variant terminates the request before any provider call is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No API key and no bearer token were presented.
    #[error("missing credentials")]
    MissingCredentials,

    /// The presented API key does not match the expected format.
    #[error("invalid api key format")]
    InvalidFormat,

    /// No API key matches the presented value.
    #[error("api key not found")]
    NotFound,

    /// The API key has been revoked.
    #[error("api key has been revoked")]
    Revoked,

    /// The API key is past its expiry.
    #[error("api key has expired")]
    Expired,

    /// The request's source IP is not on the key's allow list.
    #[error("source ip not whitelisted")]
    IpNotWhitelisted,

    /// A vendor key requires actor attribution headers.
    #[error("actor attribution required")]
    ActorRequired,

    /// The attributed actor email is not on the key's approved list.
    #[error("actor not approved for this key")]
    ActorNotApproved,

    /// The bearer session token failed validation.
    #[error("invalid session token: {0}")]
    InvalidSession(String),

    /// The credential store failed.
    #[error("credential store error: {0}")]
    Store(String),
}
