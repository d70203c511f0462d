//! Generic CRUD routes for the entity tables.
//!
//! Every [`Record`] type gets the same five endpoints under its own path.
//! Mutations carry the caller's id into the audit log.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::Principal;
use crate::models::{FinancingSource, Occupation, Procedure, ProductionRecord, Provider};
use crate::state::AppState;
use crate::store::{ListQuery, Page, Record};

pub(crate) async fn list<T: Record>(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> AppResult<Json<Page<T>>> {
    Ok(Json(state.store().list::<T>(&query).await?))
}

pub(crate) async fn show<T: Record>(State(state): State<AppState>, AppPath(id): AppPath<Uuid>) -> AppResult<Json<T>> {
    Ok(Json(state.store().get::<T>(id).await?))
}

pub(crate) async fn create<T: Record>(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    AppJson(input): AppJson<T::Create>,
) -> AppResult<Response> {
    let row = state.store().create::<T>(input, Some(principal.id)).await?;
    Ok((StatusCode::CREATED, Json(row)).into_response())
}

pub(crate) async fn update<T: Record>(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    AppPath(id): AppPath<Uuid>,
    AppJson(patch): AppJson<T::Patch>,
) -> AppResult<Json<T>> {
    Ok(Json(state.store().update::<T>(id, patch, Some(principal.id)).await?))
}

pub(crate) async fn remove<T: Record>(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    if state.store().delete::<T>(id, Some(principal.id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("{} {id} not found", T::TABLE)))
    }
}

/// List/show/create/update/delete for one record type under `base`.
pub fn crud_router<T: Record>(base: &str) -> Router<AppState> {
    Router::new()
        .route(base, get(list::<T>).post(create::<T>))
        .route(
            &format!("{base}/{{id}}"),
            get(show::<T>).put(update::<T>).delete(remove::<T>),
        )
}

/// Reference tables and the production fact table.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(crud_router::<Occupation>("/api/cbo"))
        .merge(crud_router::<Provider>("/api/prestador"))
        .merge(crud_router::<Procedure>("/api/procedimento"))
        .merge(crud_router::<FinancingSource>("/api/srub"))
        .merge(crud_router::<ProductionRecord>("/api/producao"))
}
