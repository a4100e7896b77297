//! Component wiring over in-memory or Postgres stores.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use helios_auth::{ActorResolver, ApiKeyStore, Hs256JwtValidator, InMemoryApiKeyStore};
use helios_broker::{CredentialVault, InMemoryCredentialVault, InMemoryTokenCache, TokenBroker};
use helios_infra::{
    PostgresApiKeyStore, PostgresCredentialVault, PostgresLedgerStore, PostgresMirrorStore,
};
use helios_ledger::{AuditLedger, InMemoryLedgerStore, LedgerStore};
use helios_proxy::{ProviderRegistry, ProxyDispatcher, default_registry};
use helios_sync::{InMemoryMirrorStore, MirrorStore, Reconciler};

/// Bound on a single provider call. The pipeline itself runs detached, so
/// this is the only thing that ends a hung provider exchange.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the handlers need, wired once per process.
pub struct AppServices {
    pub resolver: Arc<ActorResolver>,
    pub registry: ProviderRegistry,
    pub broker: TokenBroker,
    pub dispatcher: ProxyDispatcher,
    pub ledger: Arc<AuditLedger>,
    pub ledger_store: Arc<dyn LedgerStore>,
    pub reconciler: Reconciler,
    pub mirror_store: Arc<dyn MirrorStore>,
}

pub async fn build_services(jwt_secret: String) -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        build_persistent_services(jwt_secret).await
    } else {
        build_in_memory_services(jwt_secret)
    }
}

fn build_in_memory_services(jwt_secret: String) -> AppServices {
    build_with_stores(
        jwt_secret,
        default_registry(),
        Arc::new(InMemoryApiKeyStore::new()),
        Arc::new(InMemoryCredentialVault::new()),
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(InMemoryMirrorStore::new()),
    )
}

async fn build_persistent_services(jwt_secret: String) -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    build_with_stores(
        jwt_secret,
        default_registry(),
        Arc::new(PostgresApiKeyStore::new(pool.clone())),
        Arc::new(PostgresCredentialVault::new(pool.clone())),
        Arc::new(PostgresLedgerStore::new(pool.clone())),
        Arc::new(PostgresMirrorStore::new(pool)),
    )
}

/// Assemble services over explicit stores (tests wire their own registry
/// and in-memory stores through this).
pub fn build_with_stores(
    jwt_secret: String,
    registry: ProviderRegistry,
    keys: Arc<dyn ApiKeyStore>,
    vault: Arc<dyn CredentialVault>,
    ledger_store: Arc<dyn LedgerStore>,
    mirror_store: Arc<dyn MirrorStore>,
) -> AppServices {
    let resolver = Arc::new(ActorResolver::new(
        keys,
        Arc::new(Hs256JwtValidator::new(jwt_secret.into_bytes())),
    ));
    let broker = TokenBroker::new(vault, Arc::new(InMemoryTokenCache::new()));
    let dispatcher =
        ProxyDispatcher::new(PROVIDER_TIMEOUT).expect("failed to build provider http client");
    let ledger = AuditLedger::spawn(ledger_store.clone());
    let reconciler = Reconciler::new(mirror_store.clone());

    AppServices {
        resolver,
        registry,
        broker,
        dispatcher,
        ledger,
        ledger_store,
        reconciler,
        mirror_store,
    }
}
