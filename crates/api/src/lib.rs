//! `helios-api` — HTTP surface for the directory proxy core.
//!
//! Routes:
//! - `ANY /proxy/:provider/*path` — authenticated pass-through to the
//!   provider, with audit chaining and mirror reconciliation.
//! - `GET /admin/audit`, `GET /admin/audit/verify` — administrative ledger
//!   reads (`{success, data, message, error}` envelope).
//! - `GET /health`.

pub mod app;
pub mod middleware;
