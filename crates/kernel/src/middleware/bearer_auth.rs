//! Bearer token authentication middleware.
//!
//! Checks `Authorization: Bearer <token>` headers, verifies the JWT and
//! attaches the caller's [`Principal`] to the request. Role and status are
//! read from the account row on every request, so demoting or deactivating
//! an account takes effect before its tokens expire.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    http::StatusCode,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Account, Role};
use crate::state::AppState;
use crate::store::record;

/// Authenticated caller: a verified token whose account is still active.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer error=\"invalid_token\"")],
        axum::Json(crate::error::ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Middleware requiring a valid Bearer JWT.
///
/// Missing, malformed, expired or badly signed tokens yield 401, as do
/// tokens whose account was deleted or deactivated.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(auth_header) = auth_header else {
        return unauthorized("missing bearer token");
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return unauthorized("malformed authorization header");
    };

    let claims = match state.tokens().verify(token.trim()) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "invalid bearer token");
            return unauthorized("invalid or expired token");
        }
    };

    let Ok(id) = claims.sub.parse::<Uuid>() else {
        debug!(sub = %claims.sub, "invalid account ID in token");
        return unauthorized("invalid token subject");
    };

    let account = match record::find::<Account>(state.db(), id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            debug!(account_id = %id, "token for a deleted account");
            return unauthorized("account no longer exists");
        }
        Err(e) => return e.into_response(),
    };

    if !account.active {
        debug!(username = %account.username, "token for an inactive account");
        return unauthorized("account is inactive");
    }

    if account.role != claims.role {
        debug!(username = %account.username, "account role changed since token issue");
    }

    request.extensions_mut().insert(Principal {
        id,
        username: account.username,
        role: account.role,
    });

    next.run(request).await
}

/// Middleware restricting a router to administrators.
///
/// Must run after [`require_bearer_token`].
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<Principal>() {
        Some(principal) if principal.is_admin() => next.run(request).await,
        Some(principal) => {
            debug!(username = %principal.username, "administrator route refused");
            AppError::Authorization.into_response()
        }
        None => unauthorized("missing bearer token"),
    }
}
