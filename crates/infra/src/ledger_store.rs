//! Postgres-backed audit ledger store.
//!
//! Expected table (append-only; application code never updates or deletes):
//!
//! ```sql
//! audit_records (
//!   position bigserial primary key,  -- write order for chain verification
//!   id uuid not null unique,
//!   timestamp timestamptz not null,
//!   actor_id text not null,
//!   actor_type text not null,        -- 'internal' | 'service' | 'vendor'
//!   action text not null,
//!   target_type text,
//!   target_id text,
//!   organization_id uuid not null,
//!   outcome text not null,           -- 'success' | 'failure'
//!   status_code integer,
//!   duration_ms bigint,
//!   error_message text,
//!   request_metadata jsonb not null,
//!   response_metadata jsonb not null,
//!   previous_hash text not null,
//!   record_hash text not null
//! )
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use helios_auth::ActorType;
use helios_core::{AuditRecordId, OrganizationId};
use helios_ledger::{AuditFilter, AuditRecord, LedgerError, LedgerStore, Outcome, Pagination};

#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditRecordRow {
    id: Uuid,
    timestamp: DateTime<Utc>,
    actor_id: String,
    actor_type: String,
    action: String,
    target_type: Option<String>,
    target_id: Option<String>,
    organization_id: Uuid,
    outcome: String,
    status_code: Option<i32>,
    duration_ms: Option<i64>,
    error_message: Option<String>,
    request_metadata: JsonValue,
    response_metadata: JsonValue,
    previous_hash: String,
    record_hash: String,
}

impl AuditRecordRow {
    fn into_domain(self) -> Result<AuditRecord, LedgerError> {
        let actor_type = match self.actor_type.as_str() {
            "internal" => ActorType::Internal,
            "service" => ActorType::Service,
            "vendor" => ActorType::Vendor,
            other => return Err(LedgerError::Store(format!("unknown actor type: {other}"))),
        };
        let outcome = match self.outcome.as_str() {
            "success" => Outcome::Success,
            "failure" => Outcome::Failure,
            other => return Err(LedgerError::Store(format!("unknown outcome: {other}"))),
        };

        Ok(AuditRecord {
            id: AuditRecordId::from_uuid(self.id),
            timestamp: self.timestamp,
            actor_id: self.actor_id,
            actor_type,
            action: self.action,
            target_type: self.target_type,
            target_id: self.target_id,
            organization_id: OrganizationId::from_uuid(self.organization_id),
            outcome,
            status_code: self.status_code.map(|c| c as u16),
            duration_ms: self.duration_ms.map(|d| d as u64),
            error_message: self.error_message,
            request_metadata: self.request_metadata,
            response_metadata: self.response_metadata,
            previous_hash: self.previous_hash,
            record_hash: self.record_hash,
        })
    }
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> LedgerError {
    LedgerError::Store(format!("{operation}: {e}"))
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, record), fields(record_id = %record.id), err)]
    async fn append(&self, record: &AuditRecord) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO audit_records (
                id, timestamp, actor_id, actor_type, action,
                target_type, target_id, organization_id, outcome,
                status_code, duration_ms, error_message,
                request_metadata, response_metadata,
                previous_hash, record_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.timestamp)
        .bind(&record.actor_id)
        .bind(record.actor_type.as_str())
        .bind(&record.action)
        .bind(&record.target_type)
        .bind(&record.target_id)
        .bind(record.organization_id.as_uuid())
        .bind(record.outcome.as_str())
        .bind(record.status_code.map(|c| c as i32))
        .bind(record.duration_ms.map(|d| d as i64))
        .bind(&record.error_message)
        .bind(&record.request_metadata)
        .bind(&record.response_metadata)
        .bind(&record.previous_hash)
        .bind(&record.record_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("append", e))?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn tail_hash(&self) -> Result<Option<String>, LedgerError> {
        let row = sqlx::query(
            "SELECT record_hash FROM audit_records ORDER BY position DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("tail_hash", e))?;

        row.map(|r| r.try_get("record_hash"))
            .transpose()
            .map_err(|e| map_sqlx_error("tail_hash", e))
    }

    #[instrument(skip(self, filter), err)]
    async fn list(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<Vec<AuditRecord>, LedgerError> {
        let rows: Vec<AuditRecordRow> = sqlx::query_as(
            r#"
            SELECT
                id, timestamp, actor_id, actor_type, action,
                target_type, target_id, organization_id, outcome,
                status_code, duration_ms, error_message,
                request_metadata, response_metadata,
                previous_hash, record_hash
            FROM audit_records
            WHERE ($1::uuid IS NULL OR organization_id = $1)
              AND ($2::text IS NULL OR actor_id = $2)
              AND ($3::text IS NULL OR outcome = $3)
              AND ($4::timestamptz IS NULL OR timestamp >= $4)
              AND ($5::timestamptz IS NULL OR timestamp < $5)
            ORDER BY position ASC
            OFFSET $6 LIMIT $7
            "#,
        )
        .bind(filter.organization_id.map(|o| *o.as_uuid()))
        .bind(&filter.actor_id)
        .bind(filter.outcome.map(|o| o.as_str()))
        .bind(filter.since)
        .bind(filter.until)
        .bind(pagination.offset as i64)
        .bind(pagination.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list", e))?;

        rows.into_iter().map(AuditRecordRow::into_domain).collect()
    }
}
