//! Audited CRUD service.
//!
//! Each mutation runs the entity write and its audit entry in one
//! transaction; dropping the transaction on an error rolls both back.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::record::{self, ListQuery, Page, Pagination, Record};
use crate::error::{AppError, AppResult};
use crate::models::audit::{AuditAction, AuditEntry, NewAuditEntry};

/// Generic entity store shared by every CRUD route.
#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<EntityStoreInner>,
}

struct EntityStoreInner {
    pool: PgPool,
    max_page_size: u32,
}

impl EntityStore {
    pub fn new(pool: PgPool, max_page_size: u32) -> Self {
        Self {
            inner: Arc::new(EntityStoreInner {
                pool,
                max_page_size,
            }),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Resolve list parameters against the configured page ceiling.
    pub fn pagination(&self, page: Option<u32>, limit: Option<u32>) -> AppResult<Pagination> {
        Pagination::resolve(page, limit, self.inner.max_page_size)
    }

    /// List rows newest first, filtered by the search term when present.
    pub async fn list<T: Record>(&self, query: &ListQuery) -> AppResult<Page<T>> {
        let pagination = self.pagination(query.page, query.limit)?;
        record::list::<T>(&self.inner.pool, pagination, query.search_term()).await
    }

    /// Fetch one row.
    pub async fn get<T: Record>(&self, id: Uuid) -> AppResult<T> {
        record::find::<T>(&self.inner.pool, id)
            .await?
            .ok_or_else(|| not_found::<T>(id))
    }

    /// Validate and insert a row, auditing the new state.
    pub async fn create<T: Record>(&self, input: T::Create, actor: Option<Uuid>) -> AppResult<T> {
        let mut tx = self.inner.pool.begin().await?;

        let row = T::insert(&mut *tx, input).await?;
        AuditEntry::append(
            &mut *tx,
            NewAuditEntry {
                actor_id: actor,
                action: AuditAction::Create,
                table_name: T::TABLE,
                record_id: row.id(),
                before: None,
                after: Some(row.snapshot()),
            },
        )
        .await?;

        tx.commit().await?;

        info!(table = T::TABLE, id = %row.id(), "record created");
        Ok(row)
    }

    /// Lock, merge and write a row, auditing both states.
    pub async fn update<T: Record>(
        &self,
        id: Uuid,
        patch: T::Patch,
        actor: Option<Uuid>,
    ) -> AppResult<T> {
        let mut tx = self.inner.pool.begin().await?;

        let current = record::find_for_update::<T>(&mut *tx, id)
            .await?
            .ok_or_else(|| not_found::<T>(id))?;
        let before = current.snapshot();

        let row = T::update(&mut *tx, current, patch).await?;
        AuditEntry::append(
            &mut *tx,
            NewAuditEntry {
                actor_id: actor,
                action: AuditAction::Update,
                table_name: T::TABLE,
                record_id: id,
                before: Some(before),
                after: Some(row.snapshot()),
            },
        )
        .await?;

        tx.commit().await?;

        info!(table = T::TABLE, id = %id, "record updated");
        Ok(row)
    }

    /// Delete a row. Returns `false` when nothing matched.
    pub async fn delete<T: Record>(&self, id: Uuid, actor: Option<Uuid>) -> AppResult<bool> {
        let mut tx = self.inner.pool.begin().await?;

        let Some(removed) = record::delete::<T>(&mut *tx, id).await? else {
            return Ok(false);
        };
        AuditEntry::append(
            &mut *tx,
            NewAuditEntry {
                actor_id: actor,
                action: AuditAction::Delete,
                table_name: T::TABLE,
                record_id: id,
                before: Some(removed.snapshot()),
                after: None,
            },
        )
        .await?;

        tx.commit().await?;

        info!(table = T::TABLE, id = %id, "record deleted");
        Ok(true)
    }
}

fn not_found<T: Record>(id: Uuid) -> AppError {
    AppError::NotFound(format!("{} {id} not found", T::TABLE))
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("max_page_size", &self.inner.max_page_size)
            .finish()
    }
}
