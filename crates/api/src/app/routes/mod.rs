use axum::Router;

pub mod audit;
pub mod proxy;
pub mod system;

/// All authenticated routes.
pub fn router() -> Router {
    Router::new()
        .merge(proxy::router())
        .nest("/admin", audit::router())
}
