//! Dashboard statistics route.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::services::dashboard::{self, DashboardStats};
use crate::state::AppState;

async fn stats(State(state): State<AppState>) -> AppResult<Json<DashboardStats>> {
    Ok(Json(dashboard::stats(state.db()).await?))
}

/// Create the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/dashboard/stats", get(stats))
}
