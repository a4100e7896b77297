//! Token broker: credential bundle → short-lived bearer token.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use helios_core::OrganizationId;

use crate::cache::{CacheKey, TokenCache, TokenCacheEntry};
use crate::credential::{Credential, CredentialVault};
use crate::error::BrokerError;

/// Tokens within this margin of expiry are refreshed before use.
pub fn refresh_margin() -> Duration {
    Duration::minutes(5)
}

/// Assertion lifetime requested from the provider.
fn assertion_lifetime() -> Duration {
    Duration::hours(1)
}

/// How a provider's token endpoint is driven.
#[derive(Debug, Clone)]
pub enum TokenExchange {
    /// Signed-assertion grant (`jwt-bearer`) against a fixed endpoint.
    Assertion {
        token_endpoint: String,
        scopes: Vec<String>,
    },
    /// Client-credentials grant against a tenant-specific endpoint.
    ClientCredentials {
        authority_base: String,
        scope: String,
    },
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Exchanges vaulted credentials for bearer tokens, with caching.
///
/// The cache is a shared component injected once per process; concurrent
/// refreshes for the same key are coalesced through a per-key lock (any
/// validly issued token is usable, so this is efficiency, not correctness).
pub struct TokenBroker {
    vault: Arc<dyn CredentialVault>,
    cache: Arc<dyn TokenCache>,
    http: reqwest::Client,
    refresh_locks: tokio::sync::Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenBroker {
    pub fn new(vault: Arc<dyn CredentialVault>, cache: Arc<dyn TokenCache>) -> Self {
        Self {
            vault,
            cache,
            http: reqwest::Client::new(),
            refresh_locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Produce a bearer token for the organization, reusing the cache while
    /// more than the safety margin remains before expiry.
    #[instrument(skip(self, exchange), fields(organization_id = %organization_id))]
    pub async fn bearer_token(
        &self,
        organization_id: OrganizationId,
        exchange: &TokenExchange,
    ) -> Result<String, BrokerError> {
        let credential = self
            .vault
            .fetch_credential(organization_id)
            .await?
            .ok_or(BrokerError::NotConfigured)?;

        let key = CacheKey {
            organization_id,
            client_id: credential.identity.clone(),
        };

        if let Some(entry) = self.cache.get(&key) {
            if entry.is_fresh(Utc::now(), refresh_margin()) {
                debug!("using cached token");
                return Ok(entry.access_token);
            }
        }

        let lock = {
            let mut locks = self.refresh_locks.lock().await;
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        // A coalesced peer may have refreshed while we waited on the lock.
        if let Some(entry) = self.cache.get(&key) {
            if entry.is_fresh(Utc::now(), refresh_margin()) {
                return Ok(entry.access_token);
            }
        }

        debug!("refreshing bearer token");
        let entry = self.exchange(&credential, exchange).await?;
        let token = entry.access_token.clone();
        self.cache.set(key, entry);
        Ok(token)
    }

    async fn exchange(
        &self,
        credential: &Credential,
        exchange: &TokenExchange,
    ) -> Result<TokenCacheEntry, BrokerError> {
        let now = Utc::now();
        match exchange {
            TokenExchange::Assertion {
                token_endpoint,
                scopes,
            } => {
                let endpoint = credential
                    .token_endpoint
                    .clone()
                    .unwrap_or_else(|| token_endpoint.clone());
                let assertion = build_assertion(credential, &endpoint, scopes, now)?;
                let params = [
                    ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                    ("assertion", assertion.as_str()),
                ];
                self.post_token(&endpoint, &params, now).await
            }
            TokenExchange::ClientCredentials {
                authority_base,
                scope,
            } => {
                let tenant = credential.directory_tenant.as_deref().ok_or_else(|| {
                    BrokerError::InvalidCredential("missing directory tenant".to_string())
                })?;
                let endpoint = credential
                    .token_endpoint
                    .clone()
                    .unwrap_or_else(|| client_credentials_endpoint(authority_base, tenant));
                let params = client_credentials_params(credential, scope);
                let params: Vec<(&str, &str)> = params
                    .iter()
                    .map(|(k, v)| (*k, v.as_str()))
                    .collect();
                self.post_token(&endpoint, &params, now).await
            }
        }
    }

    async fn post_token(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        now: DateTime<Utc>,
    ) -> Result<TokenCacheEntry, BrokerError> {
        let response = self
            .http
            .post(endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BrokerError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Transport(format!("malformed token response: {e}")))?;

        Ok(TokenCacheEntry {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

/// Build the signed RS256 assertion for the jwt-bearer grant.
fn build_assertion(
    credential: &Credential,
    audience: &str,
    scopes: &[String],
    now: DateTime<Utc>,
) -> Result<String, BrokerError> {
    let key = jsonwebtoken::EncodingKey::from_rsa_pem(
        credential.secret.expose_secret().as_bytes(),
    )
    .map_err(|e| BrokerError::InvalidCredential(format!("signing key: {e}")))?;

    let claims = AssertionClaims {
        iss: &credential.identity,
        sub: credential.impersonation_subject.as_deref(),
        scope: scopes.join(" "),
        aud: audience,
        iat: now.timestamp(),
        exp: (now + assertion_lifetime()).timestamp(),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
        &claims,
        &key,
    )
    .map_err(|e| BrokerError::InvalidCredential(format!("assertion signing: {e}")))
}

fn client_credentials_endpoint(authority_base: &str, tenant: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_base.trim_end_matches('/'),
        tenant
    )
}

fn client_credentials_params(
    credential: &Credential,
    scope: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "client_credentials".to_string()),
        ("client_id", credential.identity.clone()),
        (
            "client_secret",
            credential.secret.expose_secret().to_string(),
        ),
        ("scope", scope.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryTokenCache;
    use crate::credential::InMemoryCredentialVault;
    use secrecy::SecretString;

    fn credential(organization_id: OrganizationId) -> Credential {
        Credential {
            organization_id,
            identity: "client-1".to_string(),
            secret: SecretString::new("s3cret".to_string()),
            impersonation_subject: None,
            directory_tenant: Some("tenant-1".to_string()),
            token_endpoint: None,
        }
    }

    fn exchange() -> TokenExchange {
        TokenExchange::ClientCredentials {
            authority_base: "https://login.example.test".to_string(),
            scope: "https://graph.example.test/.default".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_credential_is_not_configured() {
        let broker = TokenBroker::new(
            Arc::new(InMemoryCredentialVault::new()),
            Arc::new(InMemoryTokenCache::new()),
        );

        let err = broker
            .bearer_token(OrganizationId::new(), &exchange())
            .await
            .unwrap_err();
        assert_eq!(err, BrokerError::NotConfigured);
    }

    #[tokio::test]
    async fn fresh_cache_entry_skips_the_exchange() {
        let organization_id = OrganizationId::new();
        let vault = InMemoryCredentialVault::new();
        vault.insert(credential(organization_id));

        let cache = Arc::new(InMemoryTokenCache::new());
        cache.set(
            CacheKey {
                organization_id,
                client_id: "client-1".to_string(),
            },
            TokenCacheEntry {
                access_token: "cached-token".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            },
        );

        // The exchange endpoint is unreachable, so a cache miss would fail:
        // two successful calls prove exactly zero token exchanges happened.
        let broker = TokenBroker::new(Arc::new(vault), cache);
        for _ in 0..2 {
            let token = broker
                .bearer_token(organization_id, &exchange())
                .await
                .unwrap();
            assert_eq!(token, "cached-token");
        }
    }

    #[tokio::test]
    async fn entry_inside_margin_forces_refresh() {
        let organization_id = OrganizationId::new();
        let vault = InMemoryCredentialVault::new();
        vault.insert(credential(organization_id));

        let cache = Arc::new(InMemoryTokenCache::new());
        cache.set(
            CacheKey {
                organization_id,
                client_id: "client-1".to_string(),
            },
            TokenCacheEntry {
                access_token: "stale-token".to_string(),
                expires_at: Utc::now() + Duration::minutes(2),
            },
        );

        // Refresh is attempted (and fails on transport) instead of serving
        // the token that is inside the safety margin.
        let broker = TokenBroker::new(Arc::new(vault), cache);
        let err = broker
            .bearer_token(organization_id, &exchange())
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Transport(_)));
    }

    #[tokio::test]
    async fn client_credentials_without_tenant_is_invalid() {
        let organization_id = OrganizationId::new();
        let vault = InMemoryCredentialVault::new();
        let mut cred = credential(organization_id);
        cred.directory_tenant = None;
        vault.insert(cred);

        let broker = TokenBroker::new(Arc::new(vault), Arc::new(InMemoryTokenCache::new()));
        let err = broker
            .bearer_token(organization_id, &exchange())
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidCredential(_)));
    }

    #[test]
    fn assertion_requires_a_valid_signing_key() {
        let cred = credential(OrganizationId::new());
        let err = build_assertion(
            &cred,
            "https://oauth2.example.test/token",
            &["scope.a".to_string()],
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidCredential(_)));
    }

    #[test]
    fn tenant_specific_endpoint_shape() {
        assert_eq!(
            client_credentials_endpoint("https://login.example.test/", "tenant-1"),
            "https://login.example.test/tenant-1/oauth2/v2.0/token"
        );
    }

    #[test]
    fn client_credentials_params_carry_the_bundle() {
        let cred = credential(OrganizationId::new());
        let params = client_credentials_params(&cred, "scope.a");
        assert!(params.contains(&("grant_type", "client_credentials".to_string())));
        assert!(params.contains(&("client_id", "client-1".to_string())));
        assert!(params.contains(&("client_secret", "s3cret".to_string())));
        assert!(params.contains(&("scope", "scope.a".to_string())));
    }
}
