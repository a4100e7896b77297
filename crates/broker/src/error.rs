use thiserror::Error;

/// Token brokering failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The vault holds no credential for the organization.
    #[error("no provider credential configured")]
    NotConfigured,

    /// The provider's token endpoint refused the exchange.
    #[error("token exchange rejected with status {status}: {detail}")]
    Rejected { status: u16, detail: String },

    /// The token endpoint could not be reached.
    #[error("token endpoint transport failure: {0}")]
    Transport(String),

    /// The credential bundle is unusable (e.g. malformed signing key).
    #[error("invalid provider credential: {0}")]
    InvalidCredential(String),

    /// The vault itself failed.
    #[error("credential vault error: {0}")]
    Vault(String),
}
