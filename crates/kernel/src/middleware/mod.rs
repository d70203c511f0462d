//! HTTP middleware components.

pub mod bearer_auth;

pub use bearer_auth::{Principal, require_admin, require_bearer_token};
