//! Postgres-backed API key store.
//!
//! Expected table:
//!
//! ```sql
//! api_keys (
//!   id uuid primary key,
//!   organization_id uuid not null,
//!   name text not null,
//!   kind text not null,              -- 'service' | 'vendor'
//!   key_hash text not null unique,
//!   is_active boolean not null default true,
//!   expires_at timestamptz,
//!   last_used_at timestamptz,
//!   allowed_ips text[] not null default '{}',
//!   require_actor boolean not null default true,
//!   approved_actor_emails text[] not null default '{}',
//!   created_at timestamptz not null
//! )
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use helios_auth::{ApiKey, ApiKeyKind, ApiKeyStore, AuthError};
use helios_core::{ApiKeyId, OrganizationId};

#[derive(Debug, Clone)]
pub struct PostgresApiKeyStore {
    pool: PgPool,
}

impl PostgresApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ApiKeyRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    kind: String,
    key_hash: String,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    allowed_ips: Vec<String>,
    require_actor: bool,
    approved_actor_emails: Vec<String>,
    created_at: DateTime<Utc>,
}

impl ApiKeyRow {
    fn into_domain(self) -> Result<ApiKey, AuthError> {
        let kind = match self.kind.as_str() {
            "service" => ApiKeyKind::Service,
            "vendor" => ApiKeyKind::Vendor,
            other => {
                return Err(AuthError::Store(format!("unknown api key kind: {other}")));
            }
        };

        let allowed_ips = self
            .allowed_ips
            .iter()
            .filter_map(|raw| match raw.parse() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    tracing::warn!(key_id = %self.id, ip = %raw, "skipping unparseable allow-list entry");
                    None
                }
            })
            .collect();

        Ok(ApiKey {
            id: ApiKeyId::from_uuid(self.id),
            organization_id: OrganizationId::from_uuid(self.organization_id),
            name: self.name,
            kind,
            key_hash: self.key_hash,
            is_active: self.is_active,
            expires_at: self.expires_at,
            last_used_at: self.last_used_at,
            allowed_ips,
            require_actor: self.require_actor,
            approved_actor_emails: self.approved_actor_emails,
            created_at: self.created_at,
        })
    }
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> AuthError {
    AuthError::Store(format!("{operation}: {e}"))
}

#[async_trait]
impl ApiKeyStore for PostgresApiKeyStore {
    #[instrument(skip(self, key_hash), err)]
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AuthError> {
        let row: Option<ApiKeyRow> = sqlx::query_as(
            r#"
            SELECT
                id, organization_id, name, kind, key_hash, is_active,
                expires_at, last_used_at, allowed_ips, require_actor,
                approved_actor_emails, created_at
            FROM api_keys
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_hash", e))?;

        row.map(ApiKeyRow::into_domain).transpose()
    }

    #[instrument(skip(self), err)]
    async fn touch_last_used(&self, id: ApiKeyId, at: DateTime<Utc>) -> Result<(), AuthError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("touch_last_used", e))?;
        Ok(())
    }
}
