//! Microsoft Entra ID (Graph API).
//!
//! Authenticates via the client-credentials grant against the
//! organization's own login tenant.

use helios_broker::TokenExchange;
use helios_sync::{ResourceMatcher, ResourceType};

use crate::provider::Provider;

pub fn provider() -> Provider {
    Provider {
        slug: "microsoft",
        display_name: "Microsoft Entra ID",
        base_url: "https://graph.microsoft.com".to_string(),
        exchange: TokenExchange::ClientCredentials {
            authority_base: "https://login.microsoftonline.com".to_string(),
            scope: "https://graph.microsoft.com/.default".to_string(),
        },
        matchers: vec![
            ResourceMatcher::new("v1.0/users", ResourceType::User),
            ResourceMatcher::new("v1.0/groups", ResourceType::Group),
            ResourceMatcher::new("v1.0/directory/administrativeUnits", ResourceType::OrgUnit),
        ],
    }
}
