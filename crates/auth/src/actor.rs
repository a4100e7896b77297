use serde::{Deserialize, Serialize};

use helios_core::{ApiKeyId, OrganizationId, UserId};

/// Classification of the originator of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    /// A human user authenticated through a session.
    Internal,
    /// An automated integration using a service API key.
    Service,
    /// A vendor operator using a shared vendor API key.
    Vendor,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::Internal => "internal",
            ActorType::Service => "service",
            ActorType::Vendor => "vendor",
        }
    }
}

impl core::fmt::Display for ActorType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request attribution for a vendor key.
///
/// One vendor key may be used by several human operators, so identity is
/// supplied per request via headers rather than bound to the key itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorAttribution {
    pub name: String,
    pub email: String,
    pub actor_id: Option<String>,
    pub client_reference: Option<String>,
}

/// Resolved caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorContext {
    User {
        user_id: UserId,
        email: String,
        organization_id: OrganizationId,
    },
    ServiceKey {
        key_id: ApiKeyId,
        key_name: String,
        organization_id: OrganizationId,
    },
    VendorKey {
        key_id: ApiKeyId,
        key_name: String,
        organization_id: OrganizationId,
        attribution: VendorAttribution,
    },
}

impl ActorContext {
    pub fn organization_id(&self) -> OrganizationId {
        match self {
            ActorContext::User { organization_id, .. }
            | ActorContext::ServiceKey { organization_id, .. }
            | ActorContext::VendorKey { organization_id, .. } => *organization_id,
        }
    }

    pub fn actor_type(&self) -> ActorType {
        match self {
            ActorContext::User { .. } => ActorType::Internal,
            ActorContext::ServiceKey { .. } => ActorType::Service,
            ActorContext::VendorKey { .. } => ActorType::Vendor,
        }
    }

    /// Stable identifier used for audit attribution.
    ///
    /// For vendor keys this is the attributed operator email when present,
    /// since the key itself is shared between operators.
    pub fn actor_id(&self) -> String {
        match self {
            ActorContext::User { user_id, .. } => user_id.to_string(),
            ActorContext::ServiceKey { key_id, .. } => key_id.to_string(),
            ActorContext::VendorKey { attribution, .. } => attribution.email.clone(),
        }
    }
}
