//! Postgres-backed credential vault adapter.
//!
//! Encryption at rest is handled by the vault's own layer; this adapter
//! only assumes the contract of a decrypted read. Expected table:
//!
//! ```sql
//! org_credentials (
//!   organization_id uuid primary key,
//!   identity text not null,
//!   secret text not null,
//!   impersonation_subject text,
//!   directory_tenant text,
//!   token_endpoint text
//! )
//! ```

use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use helios_broker::{BrokerError, Credential, CredentialVault};
use helios_core::OrganizationId;

#[derive(Debug, Clone)]
pub struct PostgresCredentialVault {
    pool: PgPool,
}

impl PostgresCredentialVault {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CredentialRow {
    identity: String,
    secret: String,
    impersonation_subject: Option<String>,
    directory_tenant: Option<String>,
    token_endpoint: Option<String>,
}

#[async_trait]
impl CredentialVault for PostgresCredentialVault {
    #[instrument(skip(self), err)]
    async fn fetch_credential(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<Credential>, BrokerError> {
        let row: Option<CredentialRow> = sqlx::query_as(
            r#"
            SELECT identity, secret, impersonation_subject, directory_tenant,
                   token_endpoint
            FROM org_credentials
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BrokerError::Vault(format!("fetch_credential: {e}")))?;

        Ok(row.map(|row| Credential {
            organization_id,
            identity: row.identity,
            secret: SecretString::new(row.secret),
            impersonation_subject: row.impersonation_subject,
            directory_tenant: row.directory_tenant,
            token_endpoint: row.token_endpoint,
        }))
    }
}
