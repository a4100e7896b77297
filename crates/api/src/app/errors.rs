//! Administrative response envelope: `{ success, data?, message?, error? }`.
//!
//! Proxy responses bypass this entirely; the caller receives the provider's
//! status and body verbatim.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use helios_auth::AuthError;

pub fn envelope_ok(data: serde_json::Value) -> Response {
    (StatusCode::OK, Json(json!({"success": true, "data": data}))).into_response()
}

pub fn envelope_error(
    status: StatusCode,
    error: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": error,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn auth_error_response(err: &AuthError) -> Response {
    let (status, code, message) = match err {
        AuthError::MissingCredentials => (
            StatusCode::UNAUTHORIZED,
            "missing_credentials",
            err.to_string(),
        ),
        // Generic message for format/lookup failures to prevent key
        // enumeration.
        AuthError::InvalidFormat | AuthError::NotFound => (
            StatusCode::UNAUTHORIZED,
            "invalid_api_key",
            "invalid api key".to_string(),
        ),
        AuthError::Revoked => (StatusCode::UNAUTHORIZED, "api_key_revoked", err.to_string()),
        AuthError::Expired => (StatusCode::UNAUTHORIZED, "api_key_expired", err.to_string()),
        AuthError::IpNotWhitelisted => (
            StatusCode::UNAUTHORIZED,
            "ip_not_whitelisted",
            err.to_string(),
        ),
        AuthError::ActorRequired => (
            StatusCode::UNAUTHORIZED,
            "actor_required",
            err.to_string(),
        ),
        AuthError::ActorNotApproved => (
            StatusCode::UNAUTHORIZED,
            "actor_not_approved",
            err.to_string(),
        ),
        AuthError::InvalidSession(_) => (
            StatusCode::UNAUTHORIZED,
            "invalid_session",
            err.to_string(),
        ),
        AuthError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "authentication_unavailable",
            "authentication service unavailable".to_string(),
        ),
    };

    envelope_error(status, code, message)
}
