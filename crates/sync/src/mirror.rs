use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use helios_core::{MirrorRecordId, OrganizationId};

/// Directory resource kinds the mirror tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    User,
    Group,
    OrgUnit,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "user",
            ResourceType::Group => "group",
            ResourceType::OrgUnit => "org_unit",
        }
    }
}

impl core::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a mirror record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorStatus {
    Active,
    Deleted,
}

impl MirrorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorStatus::Active => "active",
            MirrorStatus::Deleted => "deleted",
        }
    }
}

/// Local cache of a provider-owned directory entity.
///
/// Keyed by (organization, resource type, external id); email is a
/// secondary unique key. Deletions tombstone the record so it stays
/// joinable with historical audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub id: MirrorRecordId,
    pub organization_id: OrganizationId,
    pub resource_type: ResourceType,
    pub external_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Raw provider representation (redaction is the ledger's concern;
    /// mirror rows hold directory data, not secrets).
    pub attributes: JsonValue,
    pub status: MirrorStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MirrorRecord {
    pub fn is_active(&self) -> bool {
        self.status == MirrorStatus::Active
    }
}

/// Fields extracted from a provider payload for an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorUpsert {
    pub external_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub attributes: JsonValue,
}
