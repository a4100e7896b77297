use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use secrecy::SecretString;

use helios_core::OrganizationId;

use crate::error::BrokerError;

/// An organization's secret bundle for one directory provider.
///
/// Fetched transiently from the vault per request; never persisted or
/// logged (the secret is wrapped so `Debug` redacts it).
#[derive(Debug, Clone)]
pub struct Credential {
    pub organization_id: OrganizationId,
    /// Service identity: the client email for assertion exchange, the
    /// client id for client-credentials exchange.
    pub identity: String,
    /// Signing key (PEM) or client secret.
    pub secret: SecretString,
    /// Directory admin to impersonate (assertion exchange).
    pub impersonation_subject: Option<String>,
    /// Provider-side tenant identifier (client-credentials exchange).
    pub directory_tenant: Option<String>,
    /// Overrides the exchange's default token endpoint when set.
    pub token_endpoint: Option<String>,
}

/// Decrypted credential lookup. The vault is an external collaborator;
/// only this contract is assumed.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// `Ok(None)` means the organization has no provider configured,
    /// which is distinct from a vault failure.
    async fn fetch_credential(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<Credential>, BrokerError>;
}

/// In-memory vault (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryCredentialVault {
    credentials: RwLock<HashMap<OrganizationId, Credential>>,
}

impl InMemoryCredentialVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, credential: Credential) {
        self.credentials
            .write()
            .unwrap()
            .insert(credential.organization_id, credential);
    }
}

#[async_trait]
impl CredentialVault for InMemoryCredentialVault {
    async fn fetch_credential(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<Credential>, BrokerError> {
        Ok(self
            .credentials
            .read()
            .unwrap()
            .get(&organization_id)
            .cloned())
    }
}
