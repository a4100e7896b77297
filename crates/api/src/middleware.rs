//! Actor-resolution middleware.
//!
//! Extracts authentication evidence (API key header or bearer token, vendor
//! attribution headers, source IP) and resolves it into an [`ActorContext`]
//! request extension. Requests that cannot be attributed are rejected here,
//! before any provider call.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use helios_auth::{ActorResolver, RequestEvidence};

use crate::app::errors;

#[derive(Clone)]
pub struct AuthState {
    pub resolver: Arc<ActorResolver>,
}

pub async fn actor_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let evidence = evidence_from_request(&req);

    let actor = state
        .resolver
        .resolve(&evidence, Utc::now())
        .await
        .map_err(|e| errors::auth_error_response(&e))?;

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

fn evidence_from_request(req: &axum::http::Request<axum::body::Body>) -> RequestEvidence {
    let headers = req.headers();
    let source_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    RequestEvidence {
        api_key: header_value(headers, "x-api-key"),
        bearer: bearer_token(headers),
        source_ip,
        actor_name: header_value(headers, "x-actor-name"),
        actor_email: header_value(headers, "x-actor-email"),
        actor_id: header_value(headers, "x-actor-id"),
        client_reference: header_value(headers, "x-client-reference"),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
