//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: component wiring (resolver, broker, dispatcher, ledger,
//!   reconciler) over in-memory or Postgres stores
//! - `routes/`: HTTP routes + handlers
//! - `errors.rs`: the administrative response envelope

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(jwt_secret: String) -> Router {
    let services = Arc::new(services::build_services(jwt_secret).await);
    build_app_with(services)
}

/// Build the router over pre-wired services (tests inject their own).
pub fn build_app_with(services: Arc<services::AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        resolver: services.resolver.clone(),
    };

    // Protected routes: require a resolved actor.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::actor_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
