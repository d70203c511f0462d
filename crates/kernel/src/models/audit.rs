//! Audit log entries.
//!
//! Rows are append-only; the database rejects updates and deletes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::UnknownValue;
use crate::error::AppResult;
use crate::store::record::{Page, Pagination};

/// Kind of mutation recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        }
    }
}

impl TryFrom<String> for AuditAction {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "create" => Ok(AuditAction::Create),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            _ => Err(UnknownValue::new("action", value)),
        }
    }
}

/// One audit log row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: Uuid,
    #[sqlx(rename = "before_data")]
    pub before: Option<serde_json::Value>,
    #[sqlx(rename = "after_data")]
    pub after: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Fields of an entry about to be written.
#[derive(Debug)]
pub struct NewAuditEntry<'a> {
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub table_name: &'a str,
    pub record_id: Uuid,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

impl AuditEntry {
    /// Append an entry on the caller's connection, normally inside the
    /// transaction that performed the change.
    pub async fn append(conn: &mut PgConnection, entry: NewAuditEntry<'_>) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, actor_id, action, table_name, record_id, before_data, after_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.table_name)
        .bind(entry.record_id)
        .bind(&entry.before)
        .bind(&entry.after)
        .execute(conn)
        .await?;

        debug!(
            action = entry.action.as_str(),
            table = entry.table_name,
            record_id = %entry.record_id,
            "audit log entry created"
        );

        Ok(())
    }

    /// Page through entries newest first, optionally for one table.
    pub async fn list(
        pool: &PgPool,
        pagination: Pagination,
        table: Option<&str>,
    ) -> AppResult<Page<AuditEntry>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_log WHERE ($1::text IS NULL OR table_name = $1)",
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        let data = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT * FROM audit_log
            WHERE ($1::text IS NULL OR table_name = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(table)
        .bind(i64::from(pagination.limit))
        .bind(pagination.offset() as i64)
        .fetch_all(pool)
        .await?;

        Ok(Page {
            data,
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn action_names() {
        for action in [AuditAction::Create, AuditAction::Update, AuditAction::Delete] {
            assert_eq!(
                AuditAction::try_from(action.as_str().to_string()).unwrap(),
                action
            );
        }
        assert!(AuditAction::try_from("truncate".to_string()).is_err());
    }

    #[test]
    fn entry_serializes_camel_case() {
        let entry = AuditEntry {
            id: Uuid::nil(),
            actor_id: None,
            action: AuditAction::Delete,
            table_name: "cbo".to_string(),
            record_id: Uuid::nil(),
            before: Some(serde_json::json!({"codigo": "1"})),
            after: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "delete");
        assert_eq!(json["tableName"], "cbo");
        assert_eq!(json["before"]["codigo"], "1");
        assert!(json["after"].is_null());
    }
}
