use helios_broker::TokenExchange;
use helios_sync::ResourceMatcher;

use crate::providers;

/// One external directory provider.
///
/// Provider modules supply only the differing pieces; everything else
/// (dispatch, brokering, reconciliation) is shared.
#[derive(Debug, Clone)]
pub struct Provider {
    /// URL slug the proxy route addresses the provider by.
    pub slug: &'static str,
    pub display_name: &'static str,
    /// API root the proxied path is appended to.
    pub base_url: String,
    pub exchange: TokenExchange,
    /// Ordered path → resource type table; first match wins.
    pub matchers: Vec<ResourceMatcher>,
}

/// Registry of configured providers, looked up by slug.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    pub fn get(&self, slug: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.slug == slug)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter()
    }
}

/// The built-in provider set.
pub fn default_registry() -> ProviderRegistry {
    ProviderRegistry::new(vec![providers::google::provider(), providers::microsoft::provider()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_sync::{ResourceType, resolve_resource};

    #[test]
    fn registry_lookup_by_slug() {
        let registry = default_registry();
        assert!(registry.get("google").is_some());
        assert!(registry.get("microsoft").is_some());
        assert!(registry.get("okta").is_none());
    }

    #[test]
    fn google_matchers_cover_directory_resources() {
        let registry = default_registry();
        let google = registry.get("google").unwrap();

        let users = resolve_resource(&google.matchers, "admin/directory/v1/users/u-1").unwrap();
        assert_eq!(users.resource_type, ResourceType::User);

        let orgunits = resolve_resource(
            &google.matchers,
            "admin/directory/v1/customer/C01/orgunits/sales",
        )
        .unwrap();
        assert_eq!(orgunits.resource_type, ResourceType::OrgUnit);
    }

    #[test]
    fn microsoft_matchers_cover_graph_resources() {
        let registry = default_registry();
        let microsoft = registry.get("microsoft").unwrap();

        let groups = resolve_resource(&microsoft.matchers, "v1.0/groups").unwrap();
        assert_eq!(groups.resource_type, ResourceType::Group);
    }
}
