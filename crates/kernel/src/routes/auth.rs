//! Authentication routes (login, current account).

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::extract::AppJson;
use crate::error::{AppError, AppResult};
use crate::middleware::Principal;
use crate::models::Account;
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: Account,
}

const INVALID_CREDENTIALS: &str = "invalid username or password";

/// Verify credentials and issue an access token.
async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    }

    let Some(account) = Account::find_by_username(state.db(), username).await? else {
        info!(username = %username, "login failed: unknown account");
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    };

    if !account.verify_password(&request.password) {
        info!(username = %username, "login failed: wrong password");
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    }

    if !account.active {
        warn!(username = %username, "login refused: account inactive");
        return Err(AppError::Authentication("account is inactive".to_string()));
    }

    Account::touch_login(state.db(), account.id).await?;
    let issued = state.tokens().issue(&account)?;

    info!(account_id = %account.id, username = %account.username, "login succeeded");

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_in: issued.expires_in,
        user: account,
    }))
}

/// Public profile of the authenticated caller.
async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Account>> {
    let account = state
        .store()
        .get::<Account>(principal.id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::Authentication("account no longer exists".to_string()),
            other => other,
        })?;

    Ok(Json(account))
}

/// Login is reachable without a token.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/api/auth/login", post(login))
}

/// Routes that require an authenticated caller.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth/me", get(me))
}
