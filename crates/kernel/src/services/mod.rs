//! Kernel services.

pub mod dashboard;
pub mod token;

pub use token::{IssuedToken, TokenClaims, TokenService};
