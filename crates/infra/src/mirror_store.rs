//! Postgres-backed directory mirror store.
//!
//! Expected table:
//!
//! ```sql
//! mirror_records (
//!   id uuid primary key,
//!   organization_id uuid not null,
//!   resource_type text not null,     -- 'user' | 'group' | 'org_unit'
//!   external_id text not null,
//!   email text,
//!   display_name text,
//!   attributes jsonb not null default '{}',
//!   status text not null default 'active',
//!   created_at timestamptz not null,
//!   updated_at timestamptz not null,
//!   deleted_at timestamptz,
//!   unique (organization_id, resource_type, external_id),
//!   unique (organization_id, resource_type, email)
//! )
//! ```
//!
//! Upserts go through `INSERT ... ON CONFLICT ... DO UPDATE` so concurrent
//! writes for the same entity cannot produce duplicate rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use helios_core::{MirrorRecordId, OrganizationId};
use helios_sync::{
    MirrorRecord, MirrorStatus, MirrorStore, MirrorUpsert, ResourceType, SyncError,
};

#[derive(Debug, Clone)]
pub struct PostgresMirrorStore {
    pool: PgPool,
}

impl PostgresMirrorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct MirrorRecordRow {
    id: Uuid,
    organization_id: Uuid,
    resource_type: String,
    external_id: String,
    email: Option<String>,
    display_name: Option<String>,
    attributes: JsonValue,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl MirrorRecordRow {
    fn into_domain(self) -> Result<MirrorRecord, SyncError> {
        let resource_type = match self.resource_type.as_str() {
            "user" => ResourceType::User,
            "group" => ResourceType::Group,
            "org_unit" => ResourceType::OrgUnit,
            other => return Err(SyncError::Store(format!("unknown resource type: {other}"))),
        };
        let status = match self.status.as_str() {
            "active" => MirrorStatus::Active,
            "deleted" => MirrorStatus::Deleted,
            other => return Err(SyncError::Store(format!("unknown mirror status: {other}"))),
        };

        Ok(MirrorRecord {
            id: MirrorRecordId::from_uuid(self.id),
            organization_id: OrganizationId::from_uuid(self.organization_id),
            resource_type,
            external_id: self.external_id,
            email: self.email,
            display_name: self.display_name,
            attributes: self.attributes,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> SyncError {
    SyncError::Store(format!("{operation}: {e}"))
}

const RETURNING: &str = r#"
    RETURNING id, organization_id, resource_type, external_id, email,
              display_name, attributes, status, created_at, updated_at,
              deleted_at
"#;

#[async_trait]
impl MirrorStore for PostgresMirrorStore {
    #[instrument(skip(self, upsert), fields(external_id = %upsert.external_id), err)]
    async fn upsert(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        upsert: MirrorUpsert,
        now: DateTime<Utc>,
    ) -> Result<MirrorRecord, SyncError> {
        let sql = format!(
            r#"
            INSERT INTO mirror_records (
                id, organization_id, resource_type, external_id, email,
                display_name, attributes, status, created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8, $8, NULL)
            ON CONFLICT (organization_id, resource_type, external_id) DO UPDATE SET
                email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                attributes = EXCLUDED.attributes,
                status = 'active',
                updated_at = EXCLUDED.updated_at,
                deleted_at = NULL
            {RETURNING}
            "#
        );

        let row: MirrorRecordRow = sqlx::query_as(&sql)
            .bind(MirrorRecordId::new().as_uuid())
            .bind(organization_id.as_uuid())
            .bind(resource_type.as_str())
            .bind(&upsert.external_id)
            .bind(&upsert.email)
            .bind(&upsert.display_name)
            .bind(&upsert.attributes)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert", e))?;

        row.into_domain()
    }

    #[instrument(skip(self, upsert), fields(external_id = %upsert.external_id), err)]
    async fn partial_upsert(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        upsert: MirrorUpsert,
        now: DateTime<Utc>,
    ) -> Result<MirrorRecord, SyncError> {
        // COALESCE keeps prior values for fields the update did not carry;
        // jsonb || merges the attribute object shallowly.
        let sql = format!(
            r#"
            INSERT INTO mirror_records (
                id, organization_id, resource_type, external_id, email,
                display_name, attributes, status, created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8, $8, NULL)
            ON CONFLICT (organization_id, resource_type, external_id) DO UPDATE SET
                email = COALESCE(EXCLUDED.email, mirror_records.email),
                display_name = COALESCE(EXCLUDED.display_name, mirror_records.display_name),
                attributes = mirror_records.attributes || EXCLUDED.attributes,
                updated_at = EXCLUDED.updated_at
            {RETURNING}
            "#
        );

        let row: MirrorRecordRow = sqlx::query_as(&sql)
            .bind(MirrorRecordId::new().as_uuid())
            .bind(organization_id.as_uuid())
            .bind(resource_type.as_str())
            .bind(&upsert.external_id)
            .bind(&upsert.email)
            .bind(&upsert.display_name)
            .bind(&upsert.attributes)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("partial_upsert", e))?;

        row.into_domain()
    }

    #[instrument(skip(self), err)]
    async fn tombstone(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MirrorRecord>, SyncError> {
        let sql = format!(
            r#"
            UPDATE mirror_records
            SET status = 'deleted', deleted_at = $4, updated_at = $4
            WHERE organization_id = $1 AND resource_type = $2 AND external_id = $3
            {RETURNING}
            "#
        );

        let row: Option<MirrorRecordRow> = sqlx::query_as(&sql)
            .bind(organization_id.as_uuid())
            .bind(resource_type.as_str())
            .bind(external_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("tombstone", e))?;

        row.map(MirrorRecordRow::into_domain).transpose()
    }

    #[instrument(skip(self), err)]
    async fn get(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
        external_id: &str,
    ) -> Result<Option<MirrorRecord>, SyncError> {
        let row: Option<MirrorRecordRow> = sqlx::query_as(
            r#"
            SELECT id, organization_id, resource_type, external_id, email,
                   display_name, attributes, status, created_at, updated_at,
                   deleted_at
            FROM mirror_records
            WHERE organization_id = $1 AND resource_type = $2 AND external_id = $3
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(resource_type.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.map(MirrorRecordRow::into_domain).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_active(
        &self,
        organization_id: OrganizationId,
        resource_type: ResourceType,
    ) -> Result<Vec<MirrorRecord>, SyncError> {
        let rows: Vec<MirrorRecordRow> = sqlx::query_as(
            r#"
            SELECT id, organization_id, resource_type, external_id, email,
                   display_name, attributes, status, created_at, updated_at,
                   deleted_at
            FROM mirror_records
            WHERE organization_id = $1 AND resource_type = $2 AND status = 'active'
            ORDER BY external_id ASC
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(resource_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_active", e))?;

        rows.into_iter().map(MirrorRecordRow::into_domain).collect()
    }
}
