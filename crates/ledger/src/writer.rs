//! Ledger front: open/close entries and the single-writer append task.
//!
//! Concurrent handlers would otherwise race on "read tail hash → compute →
//! append" and fork the chain. All appends therefore flow through one
//! dedicated task that owns the tail hash and serializes the sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot};

use helios_auth::ActorType;
use helios_core::{AuditRecordId, OrganizationId};

use crate::record::{DraftRecord, GENESIS_PREVIOUS_HASH, Outcome};
use crate::redact::redact;
use crate::store::LedgerStore;

/// Fields captured when an action begins, before the provider is called.
#[derive(Debug, Clone)]
pub struct OpenAudit {
    pub actor_id: String,
    pub actor_type: ActorType,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub organization_id: OrganizationId,
    /// Raw request metadata; redacted on open.
    pub request_metadata: JsonValue,
}

/// Fields known once the action completed (or failed).
#[derive(Debug, Clone)]
pub struct CloseAudit {
    pub outcome: Outcome,
    pub status_code: Option<u16>,
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
    /// Raw response metadata; redacted on close.
    pub response_metadata: JsonValue,
}

#[derive(Debug)]
struct PendingEntry {
    opened_at: DateTime<Utc>,
    entry: OpenAudit,
}

enum WriterMessage {
    Append(DraftRecord),
    /// Resolves once every previously enqueued append has been processed.
    Flush(oneshot::Sender<()>),
}

/// Hash-chained audit ledger with open/close semantics.
///
/// `open` captures the action before the provider call; `close` completes
/// the record and hands it to the writer. Both are infallible from the
/// caller's perspective: ledger problems are logged, never surfaced.
pub struct AuditLedger {
    pending: Mutex<HashMap<AuditRecordId, PendingEntry>>,
    tx: mpsc::UnboundedSender<WriterMessage>,
}

impl AuditLedger {
    /// Spawn the append task against the given store.
    pub fn spawn(store: Arc<dyn LedgerStore>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_loop(store, rx));
        Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            tx,
        })
    }

    /// Begin recording an action. Returns the ledger id to close with.
    pub fn open(&self, mut entry: OpenAudit) -> AuditRecordId {
        let id = AuditRecordId::new();
        entry.request_metadata = redact(&entry.request_metadata);
        self.pending.lock().unwrap().insert(
            id,
            PendingEntry {
                opened_at: Utc::now(),
                entry,
            },
        );
        id
    }

    /// Complete a previously opened entry and enqueue the chained write.
    pub fn close(&self, id: AuditRecordId, close: CloseAudit) {
        let Some(pending) = self.pending.lock().unwrap().remove(&id) else {
            tracing::warn!(ledger_id = %id, "audit close without matching open");
            return;
        };

        let entry = pending.entry;
        let draft = DraftRecord {
            id,
            timestamp: pending.opened_at,
            actor_id: entry.actor_id,
            actor_type: entry.actor_type,
            action: entry.action,
            target_type: entry.target_type,
            target_id: entry.target_id,
            organization_id: entry.organization_id,
            outcome: close.outcome,
            status_code: close.status_code,
            duration_ms: close.duration_ms,
            error_message: close.error_message,
            request_metadata: entry.request_metadata,
            response_metadata: redact(&close.response_metadata),
        };

        if self.tx.send(WriterMessage::Append(draft)).is_err() {
            tracing::warn!(ledger_id = %id, "audit writer unavailable; record dropped");
        }
    }

    /// Wait until the writer has drained everything enqueued so far.
    ///
    /// Used by administrative reads and tests that need the chain settled.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriterMessage::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn writer_loop(
    store: Arc<dyn LedgerStore>,
    mut rx: mpsc::UnboundedReceiver<WriterMessage>,
) {
    // Tail hash is loaded from the store on first use, then owned here.
    let mut tail: Option<String> = None;

    while let Some(message) = rx.recv().await {
        match message {
            WriterMessage::Append(draft) => {
                let previous = match &tail {
                    Some(hash) => hash.clone(),
                    None => match store.tail_hash().await {
                        Ok(stored) => stored.unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_string()),
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to load ledger tail; record dropped");
                            continue;
                        }
                    },
                };

                let record = draft.seal(previous);
                match store.append(&record).await {
                    Ok(()) => {
                        tail = Some(record.record_hash);
                    }
                    Err(e) => {
                        tracing::warn!(record_id = %record.id, error = %e, "audit append failed");
                    }
                }
            }
            WriterMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
