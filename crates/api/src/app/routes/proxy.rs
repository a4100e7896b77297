//! The pass-through proxy route.
//!
//! Pipeline: resolved actor → ledger open → credential vault → token
//! broker → provider dispatch → mirror reconciliation → ledger close →
//! provider response verbatim. The pipeline runs on a detached task so a
//! disconnected caller never cancels an in-flight provider call and the
//! ledger/mirror always reflect the real outcome.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use serde_json::{Value as JsonValue, json};

use helios_auth::ActorContext;
use helios_broker::BrokerError;
use helios_ledger::{CloseAudit, OpenAudit, Outcome};
use helios_proxy::{ProviderResponse, ProxyRequest};
use helios_sync::{SyncRequest, resolve_resource};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/proxy/:provider/*path", any(proxy))
}

pub async fn proxy(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path((provider_slug, path)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    method: Method,
    body: Bytes,
) -> Response {
    let body = match parse_body(&method, &body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    // Detached: the caller dropping the connection must not cancel the
    // provider call, or ledger and mirror would diverge from reality.
    let handle = tokio::spawn(run_pipeline(
        services,
        actor,
        provider_slug,
        path,
        method,
        query,
        body,
    ));

    match handle.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "proxy pipeline task failed");
            errors::envelope_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "proxy pipeline failed",
            )
        }
    }
}

fn parse_body(method: &Method, body: &Bytes) -> Result<Option<JsonValue>, Response> {
    if body.is_empty() || !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        return Ok(None);
    }
    serde_json::from_slice(body).map(Some).map_err(|_| {
        errors::envelope_error(
            StatusCode::BAD_REQUEST,
            "invalid_body",
            "request body must be JSON",
        )
    })
}

async fn run_pipeline(
    services: Arc<AppServices>,
    actor: ActorContext,
    provider_slug: String,
    path: String,
    method: Method,
    query: Vec<(String, String)>,
    body: Option<JsonValue>,
) -> Response {
    let Some(provider) = services.registry.get(&provider_slug) else {
        return errors::envelope_error(
            StatusCode::NOT_FOUND,
            "unknown_provider",
            format!("unknown provider: {provider_slug}"),
        );
    };

    let organization_id = actor.organization_id();
    let matched = resolve_resource(&provider.matchers, &path);
    let start = Instant::now();

    let ledger_id = services.ledger.open(OpenAudit {
        actor_id: actor.actor_id(),
        actor_type: actor.actor_type(),
        action: format!(
            "proxy.{}.{}",
            provider.slug,
            method.as_str().to_ascii_lowercase()
        ),
        target_type: matched
            .as_ref()
            .map(|m| m.resource_type.as_str().to_string()),
        target_id: matched.as_ref().and_then(|m| m.trailing_id.clone()),
        organization_id,
        request_metadata: json!({
            "method": method.as_str(),
            "path": path,
            "query": query,
            "body": body,
        }),
    });

    let token = match services
        .broker
        .bearer_token(organization_id, &provider.exchange)
        .await
    {
        Ok(token) => token,
        Err(BrokerError::NotConfigured) => {
            let message = format!(
                "{} is not configured for this organization",
                provider.display_name
            );
            services.ledger.close(
                ledger_id,
                failure_close(StatusCode::BAD_REQUEST.as_u16(), &message, start),
            );
            return errors::envelope_error(
                StatusCode::BAD_REQUEST,
                "provider_not_configured",
                message,
            );
        }
        Err(e) => {
            services.ledger.close(
                ledger_id,
                failure_close(StatusCode::BAD_GATEWAY.as_u16(), &e.to_string(), start),
            );
            return errors::envelope_error(
                StatusCode::BAD_GATEWAY,
                "token_exchange_failed",
                e.to_string(),
            );
        }
    };

    let request = ProxyRequest {
        method: method.clone(),
        path: path.clone(),
        query,
        body,
    };

    let response = match services.dispatcher.dispatch(provider, &token, &request).await {
        Ok(response) => response,
        Err(e) => {
            services.ledger.close(
                ledger_id,
                failure_close(StatusCode::BAD_GATEWAY.as_u16(), &e.to_string(), start),
            );
            return errors::envelope_error(
                StatusCode::BAD_GATEWAY,
                "provider_unreachable",
                e.to_string(),
            );
        }
    };

    // Reconciliation is best-effort and only applies real provider state.
    if response.is_success() {
        let sync_request = SyncRequest {
            organization_id,
            method: method.as_str(),
            path: &path,
            response: &response.body,
            matchers: &provider.matchers,
        };
        if let Err(e) = services.reconciler.reconcile(&sync_request).await {
            tracing::warn!(error = %e, path = %path, "mirror reconciliation failed");
        }
    }

    let outcome = if response.is_success() {
        Outcome::Success
    } else {
        Outcome::Failure
    };
    services.ledger.close(
        ledger_id,
        CloseAudit {
            outcome,
            status_code: Some(response.status),
            duration_ms: Some(start.elapsed().as_millis() as u64),
            error_message: match outcome {
                Outcome::Success => None,
                Outcome::Failure => Some(provider_error_message(&response.body)),
            },
            response_metadata: response.body.clone(),
        },
    );

    provider_response_to_http(response)
}

fn failure_close(status_code: u16, message: &str, start: Instant) -> CloseAudit {
    CloseAudit {
        outcome: Outcome::Failure,
        status_code: Some(status_code),
        duration_ms: Some(start.elapsed().as_millis() as u64),
        error_message: Some(message.to_string()),
        response_metadata: JsonValue::Null,
    }
}

fn provider_error_message(body: &JsonValue) -> String {
    body.pointer("/error/message")
        .and_then(JsonValue::as_str)
        .or_else(|| body.get("error").and_then(JsonValue::as_str))
        .unwrap_or("provider returned an error")
        .to_string()
}

/// The caller receives exactly the provider's result.
fn provider_response_to_http(response: ProviderResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    if response.body.is_null() {
        return status.into_response();
    }

    // Non-JSON provider bodies keep their original content type.
    if let JsonValue::String(text) = &response.body {
        if let Some(content_type) = &response.content_type {
            if !content_type.contains("json") {
                return (
                    status,
                    [(axum::http::header::CONTENT_TYPE, content_type.clone())],
                    text.clone(),
                )
                    .into_response();
            }
        }
    }

    (status, Json(response.body)).into_response()
}
