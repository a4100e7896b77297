use axum::response::Response;
use serde_json::json;

use crate::app::errors;

pub async fn health() -> Response {
    errors::envelope_ok(json!({"status": "ok"}))
}
