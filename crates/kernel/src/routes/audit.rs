//! Audit log browsing (administrators only).

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::extract::AppQuery;
use crate::error::AppResult;
use crate::models::AuditEntry;
use crate::state::AppState;
use crate::store::Page;

#[derive(Debug, Deserialize)]
struct AuditQuery {
    page: Option<u32>,
    limit: Option<u32>,
    table: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<AuditQuery>,
) -> AppResult<Json<Page<AuditEntry>>> {
    let pagination = state.store().pagination(query.page, query.limit)?;
    let table = query.table.as_deref().map(str::trim).filter(|t| !t.is_empty());
    Ok(Json(AuditEntry::list(state.db(), pagination, table).await?))
}

/// Create the audit log router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/audit", get(list))
}
