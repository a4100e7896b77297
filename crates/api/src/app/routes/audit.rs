//! Administrative ledger reads: record listing and chain verification.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::Response,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use helios_core::OrganizationId;
use helios_ledger::{AuditFilter, AuditRecord, LedgerStore, Outcome, Pagination, verify_chain};

use crate::app::errors;
use crate::app::services::AppServices;

/// Page size for the verification scan.
const VERIFY_PAGE: usize = 1000;

pub fn router() -> Router {
    Router::new()
        .route("/audit", get(list_audit))
        .route("/audit/verify", get(verify_audit))
}

#[derive(Debug, Deserialize)]
pub struct AuditListQuery {
    pub organization_id: Option<Uuid>,
    pub actor_id: Option<String>,
    pub outcome: Option<String>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub until: Option<chrono::DateTime<chrono::Utc>>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn list_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<AuditListQuery>,
) -> Response {
    let outcome = match params.outcome.as_deref() {
        None => None,
        Some(raw) => match Outcome::from_str(raw) {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                return errors::envelope_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_outcome",
                    "outcome must be one of: success, failure",
                );
            }
        },
    };

    let filter = AuditFilter {
        organization_id: params.organization_id.map(OrganizationId::from_uuid),
        actor_id: params.actor_id,
        outcome,
        since: params.since,
        until: params.until,
    };
    let pagination = Pagination {
        offset: params.offset.unwrap_or(0),
        limit: params.limit.unwrap_or(50),
    };

    // Settle in-flight writes so reads observe the records of completed calls.
    services.ledger.flush().await;

    match services.ledger_store.list(&filter, pagination).await {
        Ok(records) => errors::envelope_ok(json!({
            "items": records,
            "count": records.len(),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "audit list failed");
            errors::envelope_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "ledger_unavailable",
                "audit ledger unavailable",
            )
        }
    }
}

pub async fn verify_audit(Extension(services): Extension<Arc<AppServices>>) -> Response {
    services.ledger.flush().await;

    let mut records: Vec<AuditRecord> = Vec::new();
    let mut offset = 0;
    loop {
        let page = match services
            .ledger_store
            .list(
                &AuditFilter::default(),
                Pagination {
                    offset,
                    limit: VERIFY_PAGE,
                },
            )
            .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "audit verification scan failed");
                return errors::envelope_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ledger_unavailable",
                    "audit ledger unavailable",
                );
            }
        };

        let fetched = page.len();
        records.extend(page);
        if fetched < VERIFY_PAGE {
            break;
        }
        offset += fetched;
    }

    let report = verify_chain(&records);
    match serde_json::to_value(&report) {
        Ok(data) => errors::envelope_ok(data),
        Err(e) => errors::envelope_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            e.to_string(),
        ),
    }
}
