use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use helios_core::OrganizationId;

use crate::record::{AuditRecord, Outcome};

/// Ledger operation error.
///
/// These never propagate to the proxied request; the ledger front logs and
/// swallows them.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger store error: {0}")]
    Store(String),

    #[error("ledger writer unavailable")]
    WriterUnavailable,
}

/// Filters for administrative ledger reads.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub organization_id: Option<OrganizationId>,
    pub actor_id: Option<String>,
    pub outcome: Option<Outcome>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// Append-only audit record store.
///
/// Implementations must preserve write order: `list` and `tail_hash` are
/// defined over the order records were appended in.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append one sealed record.
    async fn append(&self, record: &AuditRecord) -> Result<(), LedgerError>;

    /// `record_hash` of the most recently appended record, if any.
    async fn tail_hash(&self) -> Result<Option<String>, LedgerError>;

    /// Records in write order (ascending), filtered and paginated.
    async fn list(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<Vec<AuditRecord>, LedgerError>;
}

fn matches(filter: &AuditFilter, record: &AuditRecord) -> bool {
    if let Some(org) = filter.organization_id {
        if record.organization_id != org {
            return false;
        }
    }
    if let Some(actor_id) = &filter.actor_id {
        if &record.actor_id != actor_id {
            return false;
        }
    }
    if let Some(outcome) = filter.outcome {
        if record.outcome != outcome {
            return false;
        }
    }
    if let Some(since) = filter.since {
        if record.timestamp < since {
            return false;
        }
    }
    if let Some(until) = filter.until {
        if record.timestamp >= until {
            return false;
        }
    }
    true
}

/// In-memory ledger store (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), LedgerError> {
        self.records.write().unwrap().push(record.clone());
        Ok(())
    }

    async fn tail_hash(&self) -> Result<Option<String>, LedgerError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .last()
            .map(|r| r.record_hash.clone()))
    }

    async fn list(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<Vec<AuditRecord>, LedgerError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .iter()
            .filter(|r| matches(filter, r))
            .skip(pagination.offset)
            .take(pagination.limit)
            .cloned()
            .collect())
    }
}
