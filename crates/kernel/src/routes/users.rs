//! Account administration routes (administrators only).

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Router};
use uuid::Uuid;

use super::catalog;
use super::extract::AppPath;
use crate::error::{AppError, AppResult};
use crate::middleware::Principal;
use crate::models::Account;
use crate::state::AppState;

/// Delete an account other than the caller's own.
async fn remove(
    state: State<AppState>,
    principal: Extension<Principal>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    if principal.id == id {
        return Err(AppError::Validation(
            "administrators cannot delete their own account".to_string(),
        ));
    }
    catalog::remove::<Account>(state, principal, AppPath(id)).await
}

/// Create the account administration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/users",
            get(catalog::list::<Account>).post(catalog::create::<Account>),
        )
        .route(
            "/api/users/{id}",
            get(catalog::show::<Account>)
                .put(catalog::update::<Account>)
                .delete(remove),
        )
}
