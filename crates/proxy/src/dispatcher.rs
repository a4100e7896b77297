//! Verbatim request forwarding.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value as JsonValue;
use tracing::instrument;

use crate::error::DispatchError;
use crate::provider::Provider;

/// The inbound call to forward: method, provider-relative path, query
/// pairs, and the JSON body (mutating verbs only).
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<JsonValue>,
}

/// The provider's response, propagated to the caller unchanged.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: JsonValue,
    pub content_type: Option<String>,
}

impl ProviderResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Forwards calls to a provider's API root.
///
/// Single attempt, bounded by the client timeout. Cancellation safety is
/// the caller's concern: the api layer runs the whole pipeline on a
/// detached task so a disconnected caller never aborts an in-flight call.
pub struct ProxyDispatcher {
    http: reqwest::Client,
}

impl ProxyDispatcher {
    pub fn new(timeout: Duration) -> Result<Self, DispatchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(Self { http })
    }

    #[instrument(skip(self, request), fields(provider = provider.slug, method = %request.method, path = %request.path))]
    pub async fn dispatch(
        &self,
        provider: &Provider,
        bearer_token: &str,
        request: &ProxyRequest,
    ) -> Result<ProviderResponse, DispatchError> {
        let url = join_url(&provider.base_url, &request.path);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .bearer_auth(bearer_token);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if is_mutating(&request.method) {
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DispatchError::Timeout
            } else {
                DispatchError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response
            .text()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(ProviderResponse {
            status,
            body: parse_body(status, &text),
            content_type,
        })
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Provider bodies pass through unchanged; a synthetic error body is
/// constructed only for an errored response with an empty body.
fn parse_body(status: u16, text: &str) -> JsonValue {
    if text.is_empty() {
        if status >= 400 {
            return synthetic_error_body(status);
        }
        return JsonValue::Null;
    }

    serde_json::from_str(text).unwrap_or_else(|_| JsonValue::String(text.to_string()))
}

fn synthetic_error_body(status: u16) -> JsonValue {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("provider error");
    serde_json::json!({
        "error": {
            "code": status,
            "message": reason,
        }
    })
}
