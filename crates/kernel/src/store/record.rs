//! Shared record contract and generic SQL for entity tables.
//!
//! Every table the API exposes through `/api/{entity}` implements [`Record`].
//! Reads (list, find, delete) are generic over the table; inserts and
//! merges are written per model because each validates its own fields.

use async_trait::async_trait;
use sea_query::{Alias, Asterisk, Cond, Expr, Func, Order, PostgresQueryBuilder, Query};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Default page size when the client omits `limit`.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A table row exposed through the generic CRUD routes.
#[async_trait]
pub trait Record: Serialize + for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static {
    /// Table name; also recorded as the audit entry's target table.
    const TABLE: &'static str;

    /// Text columns matched case-insensitively by `search`.
    const SEARCH_COLUMNS: &'static [&'static str];

    /// Payload accepted by `POST`.
    type Create: DeserializeOwned + Send + 'static;

    /// Partial payload accepted by `PUT`.
    type Patch: DeserializeOwned + Send + 'static;

    fn id(&self) -> Uuid;

    /// Validate and insert a new row.
    async fn insert(conn: &mut PgConnection, input: Self::Create) -> AppResult<Self>;

    /// Merge `patch` onto `current`, re-validate, and write the result.
    async fn update(conn: &mut PgConnection, current: Self, patch: Self::Patch) -> AppResult<Self>;

    /// JSON snapshot stored in the audit log.
    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Page/limit query parameters shared by list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

impl ListQuery {
    /// Trimmed search term, `None` when absent or blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Validated pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// Apply defaults, reject zero values, and clamp `limit` to `max_limit`.
    pub fn resolve(page: Option<u32>, limit: Option<u32>, max_limit: u32) -> AppResult<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::invalid("page", "must be at least 1"));
        }
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit == 0 {
            return Err(AppError::invalid("limit", "must be at least 1"));
        }
        Ok(Self {
            page,
            limit: limit.min(max_limit.max(1)),
        })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// Build the list and count statements for a table.
pub fn list_sql(
    table: &str,
    search_columns: &[&str],
    search: Option<&str>,
    pagination: Pagination,
) -> (String, String) {
    let filter = search.map(|term| {
        let pattern = format!("%{}%", escape_like_wildcards(&term.to_lowercase()));
        search_columns.iter().fold(Cond::any(), |cond, column| {
            cond.add(Expr::expr(Func::lower(Expr::col(Alias::new(*column)))).like(pattern.clone()))
        })
    });

    let mut select = Query::select();
    select.column(Asterisk).from(Alias::new(table));
    if let Some(ref cond) = filter {
        select.cond_where(cond.clone());
    }
    select
        .order_by(Alias::new("created_at"), Order::Desc)
        .order_by(Alias::new("id"), Order::Desc)
        .limit(u64::from(pagination.limit))
        .offset(pagination.offset());

    let mut count = Query::select();
    count
        .expr(Expr::col(Asterisk).count())
        .from(Alias::new(table));
    if let Some(cond) = filter {
        count.cond_where(cond);
    }

    (
        select.to_string(PostgresQueryBuilder),
        count.to_string(PostgresQueryBuilder),
    )
}

/// Paginated, optionally searched listing ordered newest first.
pub async fn list<T: Record>(
    pool: &PgPool,
    pagination: Pagination,
    search: Option<&str>,
) -> AppResult<Page<T>> {
    let (select_sql, count_sql) = list_sql(T::TABLE, T::SEARCH_COLUMNS, search, pagination);

    let total: i64 = sqlx::query_scalar(&count_sql).fetch_one(pool).await?;
    let data = sqlx::query_as::<_, T>(&select_sql).fetch_all(pool).await?;

    Ok(Page {
        data,
        total,
        page: pagination.page,
        limit: pagination.limit,
    })
}

/// Find a row by ID.
pub async fn find<'e, T: Record>(executor: impl PgExecutor<'e>, id: Uuid) -> AppResult<Option<T>> {
    let sql = format!("SELECT * FROM {} WHERE id = $1", T::TABLE);
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Find a row by ID and lock it for the rest of the transaction.
pub async fn find_for_update<T: Record>(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<T>> {
    let sql = format!("SELECT * FROM {} WHERE id = $1 FOR UPDATE", T::TABLE);
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Delete a row, returning what was removed.
pub async fn delete<T: Record>(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<T>> {
    let sql = format!("DELETE FROM {} WHERE id = $1 RETURNING *", T::TABLE);
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
pub fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Trimmed, non-empty text for a required field.
pub fn required_text(field: &str, value: Option<String>) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::required(field)),
    }
}

/// Trimmed text, with blank strings collapsed to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
