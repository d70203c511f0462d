//! Occupation (CBO) reference table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;
use crate::store::record::{Record, required_text};

/// Occupation record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Occupation {
    pub id: Uuid,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "ativo")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an occupation.
#[derive(Debug, Default, Deserialize)]
pub struct CreateOccupation {
    pub codigo: Option<String>,
    pub descricao: Option<String>,
    pub ativo: Option<bool>,
}

/// Input for updating an occupation.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateOccupation {
    pub codigo: Option<String>,
    pub descricao: Option<String>,
    pub ativo: Option<bool>,
}

#[async_trait]
impl Record for Occupation {
    const TABLE: &'static str = "cbo";
    const SEARCH_COLUMNS: &'static [&'static str] = &["code", "description"];

    type Create = CreateOccupation;
    type Patch = UpdateOccupation;

    fn id(&self) -> Uuid {
        self.id
    }

    async fn insert(conn: &mut PgConnection, input: CreateOccupation) -> AppResult<Self> {
        let code = required_text("codigo", input.codigo)?;
        let description = required_text("descricao", input.descricao)?;

        let row = sqlx::query_as::<_, Occupation>(
            r#"
            INSERT INTO cbo (id, code, description, active)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&code)
        .bind(&description)
        .bind(input.ativo.unwrap_or(true))
        .fetch_one(conn)
        .await?;

        Ok(row)
    }

    async fn update(
        conn: &mut PgConnection,
        current: Self,
        patch: UpdateOccupation,
    ) -> AppResult<Self> {
        let code = required_text("codigo", patch.codigo.or(Some(current.code)))?;
        let description = required_text("descricao", patch.descricao.or(Some(current.description)))?;
        let active = patch.ativo.unwrap_or(current.active);

        let row = sqlx::query_as::<_, Occupation>(
            r#"
            UPDATE cbo
            SET code = $1, description = $2, active = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&code)
        .bind(&description)
        .bind(active)
        .bind(current.id)
        .fetch_one(conn)
        .await?;

        Ok(row)
    }
}
