//! HTTP route handlers.

pub mod audit;
pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod extract;
pub mod health;
pub mod report;
pub mod users;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};

use crate::middleware::{require_admin, require_bearer_token};
use crate::state::AppState;

/// Assemble every route with its guard.
///
/// Health and login are public; everything else under `/api` needs a bearer
/// token, and account and audit administration additionally need the
/// administrator role.
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .merge(users::router())
        .merge(audit::router())
        .layer(from_fn(require_admin));

    let protected = Router::new()
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(catalog::router())
        .merge(report::router())
        .merge(admin)
        .layer(from_fn_with_state(state.clone(), require_bearer_token));

    Router::new()
        .merge(health::router())
        .merge(auth::public_router())
        .merge(protected)
        .with_state(state)
}
