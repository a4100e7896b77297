//! Black-box tests for the proxy pipeline against a mock provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::{Duration as ChronoDuration, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};

use helios_api::app::services::build_with_stores;
use helios_api::app::build_app_with;
use helios_auth::{
    ActorType, ApiKey, ApiKeyKind, InMemoryApiKeyStore, SessionClaims, hash_api_key,
};
use helios_broker::{Credential, InMemoryCredentialVault, TokenExchange};
use helios_core::{ApiKeyId, OrganizationId, UserId};
use helios_ledger::{AuditFilter, InMemoryLedgerStore, LedgerStore, Outcome, Pagination};
use helios_proxy::{Provider, ProviderRegistry};
use helios_sync::{InMemoryMirrorStore, MirrorStore, ResourceMatcher, ResourceType};

// ─────────────────────────────────────────────────────────────────────────────
// Mock provider
// ─────────────────────────────────────────────────────────────────────────────

async fn token_endpoint(State(exchanges): State<Arc<AtomicUsize>>) -> Json<Value> {
    exchanges.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "access_token": "mock-token",
        "expires_in": 3600,
        "token_type": "Bearer",
    }))
}

async fn list_users() -> Json<Value> {
    let users: Vec<Value> = (1..=5)
        .map(|i| {
            json!({
                "id": format!("u-{i}"),
                "primaryEmail": format!("user{i}@example.com"),
                "name": {"fullName": format!("User {i}")},
            })
        })
        .collect();
    Json(json!({"kind": "admin#directory#users", "users": users}))
}

async fn create_user(Json(mut body): Json<Value>) -> Json<Value> {
    body["id"] = json!("u-900");
    Json(body)
}

async fn patch_user(Path(id): Path<String>, Json(mut body): Json<Value>) -> Json<Value> {
    body["id"] = json!(id);
    Json(body)
}

async fn delete_user() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn provider_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": {"message": "mock resource not found"}})),
    )
}

async fn spawn_mock_provider() -> (String, Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
    let exchanges = Arc::new(AtomicUsize::new(0));

    let app = Router::new()
        .route("/:tenant/oauth2/v2.0/token", post(token_endpoint))
        .route("/admin/directory/v1/users", get(list_users).post(create_user))
        .route(
            "/admin/directory/v1/users/:id",
            delete(delete_user).patch(patch_user),
        )
        .fallback(provider_not_found)
        .with_state(exchanges.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock provider");
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base_url, exchanges, handle)
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

const JWT_SECRET: &str = "test-secret";
const SERVICE_KEY: &str = "helios_live_abc123";
const BARE_ORG_KEY: &str = "helios_live_bare01";
const VENDOR_KEY: &str = "helios_live_vendor1";

struct Harness {
    base_url: String,
    services: Arc<helios_api::app::services::AppServices>,
    mirror: Arc<InMemoryMirrorStore>,
    token_exchanges: Arc<AtomicUsize>,
    /// Organization with a vaulted provider credential.
    organization_id: OrganizationId,
    /// Organization with API keys but no provider credential.
    bare_organization_id: OrganizationId,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl Drop for Harness {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

fn api_key(raw: &str, kind: ApiKeyKind, organization_id: OrganizationId) -> ApiKey {
    ApiKey {
        id: ApiKeyId::new(),
        organization_id,
        name: format!("{kind:?} key"),
        kind,
        key_hash: hash_api_key(raw),
        is_active: true,
        expires_at: None,
        last_used_at: None,
        allowed_ips: vec![],
        require_actor: true,
        approved_actor_emails: vec![],
        created_at: Utc::now(),
    }
}

async fn spawn_harness() -> Harness {
    let (provider_base, token_exchanges, provider_handle) = spawn_mock_provider().await;

    let registry = ProviderRegistry::new(vec![Provider {
        slug: "google",
        display_name: "Google Workspace",
        base_url: provider_base.clone(),
        exchange: TokenExchange::ClientCredentials {
            authority_base: provider_base,
            scope: "directory.test".to_string(),
        },
        matchers: vec![
            ResourceMatcher::new("admin/directory/v1/users", ResourceType::User),
            ResourceMatcher::new("admin/directory/v1/groups", ResourceType::Group),
        ],
    }]);

    let keys = Arc::new(InMemoryApiKeyStore::new());
    let vault = Arc::new(InMemoryCredentialVault::new());
    let ledger_store = Arc::new(InMemoryLedgerStore::new());
    let mirror = Arc::new(InMemoryMirrorStore::new());

    let organization_id = OrganizationId::new();
    vault.insert(Credential {
        organization_id,
        identity: "client-1".to_string(),
        secret: SecretString::new("mock-secret".to_string()),
        impersonation_subject: None,
        directory_tenant: Some("tenant-1".to_string()),
        token_endpoint: None,
    });

    let bare_organization_id = OrganizationId::new();

    keys.insert(api_key(SERVICE_KEY, ApiKeyKind::Service, organization_id));
    keys.insert(api_key(BARE_ORG_KEY, ApiKeyKind::Service, bare_organization_id));
    keys.insert(api_key(VENDOR_KEY, ApiKeyKind::Vendor, organization_id));

    let services = Arc::new(build_with_stores(
        JWT_SECRET.to_string(),
        registry,
        keys,
        vault,
        ledger_store,
        mirror.clone(),
    ));

    let app = build_app_with(services.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind app server");
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let app_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Harness {
        base_url,
        services,
        mirror,
        token_exchanges,
        organization_id,
        bare_organization_id,
        handles: vec![provider_handle, app_handle],
    }
}

async fn audit_records(harness: &Harness) -> Vec<helios_ledger::AuditRecord> {
    harness.services.ledger.flush().await;
    harness
        .services
        .ledger_store
        .list(
            &AuditFilter::default(),
            Pagination {
                offset: 0,
                limit: 1000,
            },
        )
        .await
        .unwrap()
}

fn mint_session(organization_id: OrganizationId) -> String {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: UserId::new(),
        organization_id,
        email: "admin@example.com".to_string(),
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
    let harness = spawn_harness().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", harness.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("ok"));
}

#[tokio::test]
async fn proxy_requires_credentials() {
    let harness = spawn_harness().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/proxy/google/admin/directory/v1/users",
            harness.base_url
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("missing_credentials"));
}

#[tokio::test]
async fn service_key_list_flow_audits_brokers_and_mirrors() {
    let harness = spawn_harness().await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let res = client
            .get(format!(
                "{}/proxy/google/admin/directory/v1/users",
                harness.base_url
            ))
            .query(&[("maxResults", "5")])
            .header("X-API-Key", SERVICE_KEY)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), reqwest::StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        // The provider's response passes through unchanged.
        assert_eq!(body["kind"], json!("admin#directory#users"));
        assert_eq!(body["users"].as_array().unwrap().len(), 5);
    }

    // Both calls rode a single token exchange (cache validity window).
    assert_eq!(harness.token_exchanges.load(Ordering::SeqCst), 1);

    let records = audit_records(&harness).await;
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.actor_type, ActorType::Service);
        assert_eq!(record.action, "proxy.google.get");
        assert_eq!(record.outcome, Outcome::Success);
        assert_eq!(record.organization_id, harness.organization_id);
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.target_type.as_deref(), Some("user"));
    }

    // The page items were reconciled into the mirror.
    let users = harness
        .mirror
        .list_active(harness.organization_id, ResourceType::User)
        .await
        .unwrap();
    assert_eq!(users.len(), 5);
}

#[tokio::test]
async fn vendor_key_requires_actor_attribution() {
    let harness = spawn_harness().await;
    let client = reqwest::Client::new();
    let url = format!(
        "{}/proxy/google/admin/directory/v1/users",
        harness.base_url
    );

    let res = client
        .get(&url)
        .header("X-API-Key", VENDOR_KEY)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], json!("actor_required"));
    // Rejected before any provider call.
    assert_eq!(harness.token_exchanges.load(Ordering::SeqCst), 0);

    // With attribution headers the same key resolves and proxies.
    let res = client
        .get(&url)
        .header("X-API-Key", VENDOR_KEY)
        .header("X-Actor-Name", "Sam Operator")
        .header("X-Actor-Email", "sam@vendor.example")
        .header("X-Client-Reference", "TICKET-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let records = audit_records(&harness).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].actor_type, ActorType::Vendor);
    assert_eq!(records[0].actor_id, "sam@vendor.example");
}

#[tokio::test]
async fn unconfigured_organization_is_a_configuration_error() {
    let harness = spawn_harness().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/proxy/google/admin/directory/v1/users",
            harness.base_url
        ))
        .header("X-API-Key", BARE_ORG_KEY)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("provider_not_configured"));
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("not configured for this organization")
    );

    // No provider call was made, but the failure was still recorded.
    assert_eq!(harness.token_exchanges.load(Ordering::SeqCst), 0);
    let records = audit_records(&harness).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, Outcome::Failure);
    assert_eq!(records[0].organization_id, harness.bare_organization_id);
    assert!(records[0].error_message.as_deref().unwrap().contains("not configured"));
}

#[tokio::test]
async fn provider_errors_pass_through_verbatim() {
    let harness = spawn_harness().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/proxy/google/admin/directory/v1/domains",
            harness.base_url
        ))
        .header("X-API-Key", SERVICE_KEY)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["message"], json!("mock resource not found"));

    let records = audit_records(&harness).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, Outcome::Failure);
    assert_eq!(records[0].status_code, Some(404));
    assert_eq!(
        records[0].error_message.as_deref(),
        Some("mock resource not found")
    );
}

#[tokio::test]
async fn mirror_lifecycle_create_update_delete() {
    let harness = spawn_harness().await;
    let client = reqwest::Client::new();
    let users_url = format!(
        "{}/proxy/google/admin/directory/v1/users",
        harness.base_url
    );

    // CREATE: the provider's response (with its id) lands in the mirror.
    let res = client
        .post(&users_url)
        .header("X-API-Key", SERVICE_KEY)
        .json(&json!({
            "primaryEmail": "new@example.com",
            "name": {"fullName": "New User"},
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let record = harness
        .mirror
        .get(harness.organization_id, ResourceType::User, "u-900")
        .await
        .unwrap()
        .expect("created user must be mirrored");
    assert_eq!(record.email.as_deref(), Some("new@example.com"));
    assert!(record.is_active());

    // UPDATE: only provided fields overwrite.
    let res = client
        .patch(format!("{users_url}/u-900"))
        .header("X-API-Key", SERVICE_KEY)
        .json(&json!({"suspended": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let record = harness
        .mirror
        .get(harness.organization_id, ResourceType::User, "u-900")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.email.as_deref(), Some("new@example.com"));
    assert_eq!(record.attributes["suspended"], json!(true));

    // DELETE: tombstoned, excluded from active, still retrievable.
    let res = client
        .delete(format!("{users_url}/u-900"))
        .header("X-API-Key", SERVICE_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NO_CONTENT);

    let active = harness
        .mirror
        .list_active(harness.organization_id, ResourceType::User)
        .await
        .unwrap();
    assert!(active.iter().all(|r| r.external_id != "u-900"));

    let record = harness
        .mirror
        .get(harness.organization_id, ResourceType::User, "u-900")
        .await
        .unwrap()
        .expect("tombstoned user must stay retrievable");
    assert!(record.deleted_at.is_some());
}

#[tokio::test]
async fn session_bearer_reads_the_admin_ledger() {
    let harness = spawn_harness().await;
    let client = reqwest::Client::new();

    // Generate a little ledger traffic first.
    client
        .get(format!(
            "{}/proxy/google/admin/directory/v1/users",
            harness.base_url
        ))
        .header("X-API-Key", SERVICE_KEY)
        .send()
        .await
        .unwrap();

    let token = mint_session(harness.organization_id);

    let res = client
        .get(format!("{}/admin/audit", harness.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["count"], json!(1));
    assert_eq!(
        body["data"]["items"][0]["actor_type"],
        json!("service")
    );

    let res = client
        .get(format!("{}/admin/audit/verify", harness.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["valid"], json!(true));
    assert_eq!(body["data"]["checked"], json!(1));
}

#[tokio::test]
async fn unknown_provider_is_a_404() {
    let harness = spawn_harness().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/proxy/okta/api/v1/users", harness.base_url))
        .header("X-API-Key", SERVICE_KEY)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], json!("unknown_provider"));
}
