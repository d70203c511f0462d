//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

/// Minimum length of the JWT signing secret in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// HMAC secret used to sign access tokens (at least 32 bytes).
    pub jwt_secret: String,

    /// Access token lifetime in seconds (default: 8 hours).
    pub jwt_ttl_seconds: i64,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Largest page size honored by list and report endpoints (default: 10000).
    pub report_max_page_size: u32,

    /// Number of rows echoed back by the export acknowledgement (default: 10).
    pub export_sample_size: usize,

    /// PostgreSQL statement timeout applied to report queries (default: "30s").
    pub report_statement_timeout: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let jwt_secret =
            env::var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        let jwt_ttl_seconds = env::var("JWT_TTL_SECONDS")
            .unwrap_or_else(|_| "28800".to_string())
            .parse()
            .context("JWT_TTL_SECONDS must be a valid i64")?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let report_max_page_size = env::var("REPORT_MAX_PAGE_SIZE")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .context("REPORT_MAX_PAGE_SIZE must be a valid u32")?;

        let export_sample_size = env::var("EXPORT_SAMPLE_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("EXPORT_SAMPLE_SIZE must be a valid usize")?;

        let report_statement_timeout =
            env::var("REPORT_STATEMENT_TIMEOUT").unwrap_or_else(|_| "30s".to_string());
        if !is_valid_timeout(&report_statement_timeout) {
            anyhow::bail!("REPORT_STATEMENT_TIMEOUT must look like 30s, 500ms or 2min");
        }

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            jwt_secret,
            jwt_ttl_seconds,
            cors_allowed_origins,
            report_max_page_size,
            export_sample_size,
            report_statement_timeout,
        })
    }
}

/// Accept only `<digits><unit>` so the value can be inlined into `SET LOCAL`.
fn is_valid_timeout(value: &str) -> bool {
    let digits = value.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && matches!(&value[digits..], "ms" | "s" | "min")
}
