//! `helios-ledger` — tamper-evident, hash-chained audit ledger.
//!
//! Every proxied action is recorded as an [`AuditRecord`] whose hash covers
//! the previous record's hash, so any retroactive edit breaks verification
//! from that record forward. Writes are serialized through a single-writer
//! append task; ledger failures are logged and never fail the caller.

pub mod record;
pub mod redact;
pub mod store;
pub mod writer;

pub use record::{
    AuditRecord, ChainReport, DraftRecord, GENESIS_PREVIOUS_HASH, Outcome, verify_chain,
};
pub use redact::{REDACTION_MARKER, redact};
pub use store::{AuditFilter, InMemoryLedgerStore, LedgerError, LedgerStore, Pagination};
pub use writer::{AuditLedger, CloseAudit, OpenAudit};
