//! Audit record model and hash chaining.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use helios_auth::ActorType;
use helios_core::{AuditRecordId, OrganizationId};

/// Sentinel `previous_hash` for the first record of the chain.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Outcome of the recorded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

impl core::fmt::Display for Outcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Outcome {
    type Err = helios_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Outcome::Success),
            "failure" => Ok(Outcome::Failure),
            other => Err(helios_core::DomainError::validation(format!(
                "unknown outcome: {other}"
            ))),
        }
    }
}

/// A sealed, append-only audit record.
///
/// # Invariants
/// - `record_hash = SHA-256(canonical(fields) ‖ previous_hash)`.
/// - `previous_hash` equals the `record_hash` of the chronologically
///   preceding record (the genesis sentinel for the first one).
/// - Never mutated after the closing write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_type: ActorType,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub organization_id: OrganizationId,
    pub outcome: Outcome,
    pub status_code: Option<u16>,
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
    /// Redacted request metadata (method, path, query, body).
    pub request_metadata: JsonValue,
    /// Redacted response metadata.
    pub response_metadata: JsonValue,
    pub previous_hash: String,
    pub record_hash: String,
}

/// Record contents before chaining. Produced by the ledger front,
/// sealed by the single writer once the previous hash is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRecord {
    pub id: AuditRecordId,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_type: ActorType,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub organization_id: OrganizationId,
    pub outcome: Outcome,
    pub status_code: Option<u16>,
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
    pub request_metadata: JsonValue,
    pub response_metadata: JsonValue,
}

impl DraftRecord {
    /// Seal the draft into the chain after the given predecessor hash.
    pub fn seal(self, previous_hash: String) -> AuditRecord {
        let mut record = AuditRecord {
            id: self.id,
            timestamp: self.timestamp,
            actor_id: self.actor_id,
            actor_type: self.actor_type,
            action: self.action,
            target_type: self.target_type,
            target_id: self.target_id,
            organization_id: self.organization_id,
            outcome: self.outcome,
            status_code: self.status_code,
            duration_ms: self.duration_ms,
            error_message: self.error_message,
            request_metadata: self.request_metadata,
            response_metadata: self.response_metadata,
            previous_hash,
            record_hash: String::new(),
        };
        record.record_hash = compute_record_hash(&record.canonical_payload(), &record.previous_hash);
        record
    }
}

impl AuditRecord {
    /// Canonical serialization of all data fields (everything except the
    /// two hash fields), with lexicographically ordered keys.
    ///
    /// `serde_json`'s map type is a BTreeMap, so serializing through
    /// `Value` yields a stable key order.
    pub fn canonical_payload(&self) -> String {
        serde_json::json!({
            "id": self.id,
            "timestamp": self.timestamp,
            "actor_id": self.actor_id,
            "actor_type": self.actor_type,
            "action": self.action,
            "target_type": self.target_type,
            "target_id": self.target_id,
            "organization_id": self.organization_id,
            "outcome": self.outcome,
            "status_code": self.status_code,
            "duration_ms": self.duration_ms,
            "error_message": self.error_message,
            "request_metadata": self.request_metadata,
            "response_metadata": self.response_metadata,
        })
        .to_string()
    }

    /// Recompute this record's hash and compare against the stored one.
    pub fn verify(&self) -> bool {
        compute_record_hash(&self.canonical_payload(), &self.previous_hash) == self.record_hash
    }
}

/// `SHA-256(canonical ‖ previous_hash)`, hex-encoded.
pub fn compute_record_hash(canonical: &str, previous_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(previous_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Result of a chain verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Number of records checked (all of them, even past a break).
    pub checked: usize,
    pub valid: bool,
    /// First record at which the chain no longer verifies.
    pub broken_at: Option<AuditRecordId>,
}

/// Recompute hashes over records in write order.
///
/// A record breaks the chain if its `previous_hash` does not match its
/// predecessor's `record_hash`, or if its own hash does not recompute.
pub fn verify_chain(records: &[AuditRecord]) -> ChainReport {
    let mut expected_previous = GENESIS_PREVIOUS_HASH.to_string();
    let mut broken_at = None;

    for record in records {
        if broken_at.is_none()
            && (record.previous_hash != expected_previous || !record.verify())
        {
            broken_at = Some(record.id);
        }
        expected_previous = record.record_hash.clone();
    }

    ChainReport {
        checked: records.len(),
        valid: broken_at.is_none(),
        broken_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft(action: &str, outcome: Outcome) -> DraftRecord {
        DraftRecord {
            id: AuditRecordId::new(),
            timestamp: Utc::now(),
            actor_id: "svc-1".to_string(),
            actor_type: ActorType::Service,
            action: action.to_string(),
            target_type: Some("user".to_string()),
            target_id: Some("u-100".to_string()),
            organization_id: OrganizationId::new(),
            outcome,
            status_code: Some(200),
            duration_ms: Some(12),
            error_message: None,
            request_metadata: serde_json::json!({"method": "GET"}),
            response_metadata: serde_json::Value::Null,
        }
    }

    fn chain_of(n: usize) -> Vec<AuditRecord> {
        let mut previous = GENESIS_PREVIOUS_HASH.to_string();
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let record = draft(&format!("proxy.google.get.{i}"), Outcome::Success).seal(previous);
            previous = record.record_hash.clone();
            records.push(record);
        }
        records
    }

    #[test]
    fn sealed_record_verifies() {
        let record = draft("proxy.google.get", Outcome::Success)
            .seal(GENESIS_PREVIOUS_HASH.to_string());
        assert!(record.verify());
        assert_eq!(record.record_hash.len(), 64);
    }

    #[test]
    fn canonical_payload_is_stable() {
        let record = draft("proxy.google.get", Outcome::Success)
            .seal(GENESIS_PREVIOUS_HASH.to_string());
        assert_eq!(record.canonical_payload(), record.canonical_payload());
        // Keys are emitted sorted, so the payload starts with "action".
        assert!(record.canonical_payload().starts_with("{\"action\""));
    }

    #[test]
    fn edited_record_breaks_verification_from_that_point() {
        let mut records = chain_of(5);
        assert!(verify_chain(&records).valid);

        records[2].action = "proxy.google.delete".to_string();

        let report = verify_chain(&records);
        assert!(!report.valid);
        assert_eq!(report.broken_at, Some(records[2].id));
        assert_eq!(report.checked, 5);
    }

    #[test]
    fn swapped_records_break_the_chain() {
        let mut records = chain_of(4);
        records.swap(1, 2);
        assert!(!verify_chain(&records).valid);
    }

    #[test]
    fn empty_chain_is_valid() {
        let report = verify_chain(&[]);
        assert!(report.valid);
        assert_eq!(report.checked, 0);
    }

    proptest! {
        /// For any sequence of sequentially sealed records, recomputing
        /// hashes from the first record reproduces every stored hash.
        #[test]
        fn sequential_chains_always_verify(
            actions in prop::collection::vec("[a-z.]{1,24}", 1..20),
            failures in prop::collection::vec(any::<bool>(), 1..20),
        ) {
            let mut previous = GENESIS_PREVIOUS_HASH.to_string();
            let mut records = Vec::new();
            for (i, action) in actions.iter().enumerate() {
                let outcome = if *failures.get(i).unwrap_or(&false) {
                    Outcome::Failure
                } else {
                    Outcome::Success
                };
                let record = draft(action, outcome).seal(previous);
                previous = record.record_hash.clone();
                records.push(record);
            }

            prop_assert!(verify_chain(&records).valid);
        }
    }
}
