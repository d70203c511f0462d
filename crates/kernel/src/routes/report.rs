//! Report routes.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::extract::{AppJson, AppQuery};
use crate::error::AppResult;
use crate::report::{ExportAck, ExportRequest, FilterModel, ReportRecord};
use crate::state::AppState;
use crate::store::Page;

/// Query string of `GET /api/reports/data`.
///
/// `filters` carries the JSON filter model; the legacy keys may also be
/// given as plain parameters and apply when the JSON omits them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportQuery {
    page: Option<u32>,
    limit: Option<u32>,
    filters: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    prestador: Option<String>,
    procedimento: Option<String>,
}

async fn data(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ReportQuery>,
) -> AppResult<Json<Page<ReportRecord>>> {
    let pagination = state.reports().pagination(query.page, query.limit)?;
    let model = FilterModel::from_json(query.filters.as_deref().unwrap_or_default())?
        .with_legacy_defaults(
            query.date_from,
            query.date_to,
            query.prestador,
            query.procedimento,
        );

    Ok(Json(state.reports().data(&model, pagination).await?))
}

async fn export(
    State(state): State<AppState>,
    AppJson(request): AppJson<ExportRequest>,
) -> AppResult<Json<ExportAck>> {
    Ok(Json(state.reports().export(request).await?))
}

/// Create the report router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reports/data", get(data))
        .route("/api/reports/export", post(export))
}
