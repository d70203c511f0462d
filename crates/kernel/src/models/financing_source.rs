//! Financing source (SRUB) reference table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;
use crate::store::record::{Record, optional_text, required_text};

/// Financing source record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FinancingSource {
    pub id: Uuid,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "tipoFinanciamento")]
    pub financing_type: Option<String>,
    #[serde(rename = "ativo")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a financing source.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFinancingSource {
    pub codigo: Option<String>,
    pub descricao: Option<String>,
    pub tipo_financiamento: Option<String>,
    pub ativo: Option<bool>,
}

/// Input for updating a financing source.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFinancingSource {
    pub codigo: Option<String>,
    pub descricao: Option<String>,
    pub tipo_financiamento: Option<String>,
    pub ativo: Option<bool>,
}

#[async_trait]
impl Record for FinancingSource {
    const TABLE: &'static str = "srub";
    const SEARCH_COLUMNS: &'static [&'static str] = &["code", "description"];

    type Create = CreateFinancingSource;
    type Patch = UpdateFinancingSource;

    fn id(&self) -> Uuid {
        self.id
    }

    async fn insert(conn: &mut PgConnection, input: CreateFinancingSource) -> AppResult<Self> {
        let code = required_text("codigo", input.codigo)?;
        let description = required_text("descricao", input.descricao)?;

        let row = sqlx::query_as::<_, FinancingSource>(
            r#"
            INSERT INTO srub (id, code, description, financing_type, active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&code)
        .bind(&description)
        .bind(optional_text(input.tipo_financiamento))
        .bind(input.ativo.unwrap_or(true))
        .fetch_one(conn)
        .await?;

        Ok(row)
    }

    async fn update(
        conn: &mut PgConnection,
        current: Self,
        patch: UpdateFinancingSource,
    ) -> AppResult<Self> {
        let code = required_text("codigo", patch.codigo.or(Some(current.code)))?;
        let description = required_text("descricao", patch.descricao.or(Some(current.description)))?;
        let financing_type = match patch.tipo_financiamento {
            Some(value) => optional_text(Some(value)),
            None => current.financing_type,
        };
        let active = patch.ativo.unwrap_or(current.active);

        let row = sqlx::query_as::<_, FinancingSource>(
            r#"
            UPDATE srub
            SET code = $1, description = $2, financing_type = $3, active = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&code)
        .bind(&description)
        .bind(&financing_type)
        .bind(active)
        .bind(current.id)
        .fetch_one(conn)
        .await?;

        Ok(row)
    }
}
