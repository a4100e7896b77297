//! Google Workspace (Admin SDK Directory).
//!
//! Authenticates via a service-account assertion with domain-wide
//! delegation: the signed JWT names the impersonated directory admin.

use helios_broker::TokenExchange;
use helios_sync::{ResourceMatcher, ResourceType};

use crate::provider::Provider;

pub fn provider() -> Provider {
    Provider {
        slug: "google",
        display_name: "Google Workspace",
        base_url: "https://www.googleapis.com".to_string(),
        exchange: TokenExchange::Assertion {
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/admin.directory.user".to_string(),
                "https://www.googleapis.com/auth/admin.directory.group".to_string(),
                "https://www.googleapis.com/auth/admin.directory.orgunit".to_string(),
            ],
        },
        matchers: vec![
            ResourceMatcher::new("admin/directory/v1/users", ResourceType::User),
            ResourceMatcher::new("admin/directory/v1/groups", ResourceType::Group),
            ResourceMatcher::new(
                "admin/directory/v1/customer/*/orgunits",
                ResourceType::OrgUnit,
            ),
        ],
    }
}
