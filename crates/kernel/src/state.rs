//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::report::ReportService;
use crate::services::TokenService;
use crate::store::EntityStore;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Access token signing and verification.
    tokens: TokenService,

    /// Audited CRUD over the entity tables.
    store: EntityStore,

    /// Report execution.
    reports: ReportService,
}

impl AppState {
    /// Connect to the database, apply migrations and build services.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;
        info!("Connected to PostgreSQL");

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;
        info!("Database migrations applied");

        Ok(Self::with_pool(db, config))
    }

    /// Build state around an existing pool (migrations already applied).
    pub fn with_pool(db: PgPool, config: &Config) -> Self {
        let tokens = TokenService::new(config.jwt_secret.as_bytes(), config.jwt_ttl_seconds);
        let store = EntityStore::new(db.clone(), config.report_max_page_size);
        let reports = ReportService::new(
            db.clone(),
            config.report_max_page_size,
            config.report_statement_timeout.clone(),
            config.export_sample_size,
        );

        Self {
            inner: Arc::new(AppStateInner {
                db,
                tokens,
                store,
                reports,
            }),
        }
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get the token service.
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Get the entity store.
    pub fn store(&self) -> &EntityStore {
        &self.inner.store
    }

    /// Get the report service.
    pub fn reports(&self) -> &ReportService {
        &self.inner.reports
    }
}
