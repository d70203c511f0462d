//! Procedure (procedimento) reference table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use super::{UnknownValue, money};
use crate::error::AppResult;
use crate::store::record::{Record, required_text};

/// Integer digits of `procedimento.value` (`NUMERIC(12, 2)`).
const VALUE_DIGITS: u32 = 10;

/// Complexity tier of a procedure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Baixa,
    Media,
    Alta,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Baixa => "baixa",
            Complexity::Media => "media",
            Complexity::Alta => "alta",
        }
    }
}

impl TryFrom<String> for Complexity {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "baixa" => Ok(Complexity::Baixa),
            "media" => Ok(Complexity::Media),
            "alta" => Ok(Complexity::Alta),
            _ => Err(UnknownValue::new("complexity", value)),
        }
    }
}

/// Procedure record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub id: Uuid,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "valor")]
    pub value: Decimal,
    #[serde(rename = "complexidade")]
    #[sqlx(try_from = "String")]
    pub complexity: Complexity,
    #[serde(rename = "ativo")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a procedure.
#[derive(Debug, Default, Deserialize)]
pub struct CreateProcedure {
    pub codigo: Option<String>,
    pub descricao: Option<String>,
    pub valor: Option<Decimal>,
    pub complexidade: Option<Complexity>,
    pub ativo: Option<bool>,
}

/// Input for updating a procedure.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProcedure {
    pub codigo: Option<String>,
    pub descricao: Option<String>,
    pub valor: Option<Decimal>,
    pub complexidade: Option<Complexity>,
    pub ativo: Option<bool>,
}

#[async_trait]
impl Record for Procedure {
    const TABLE: &'static str = "procedimento";
    const SEARCH_COLUMNS: &'static [&'static str] = &["code", "description"];

    type Create = CreateProcedure;
    type Patch = UpdateProcedure;

    fn id(&self) -> Uuid {
        self.id
    }

    async fn insert(conn: &mut PgConnection, input: CreateProcedure) -> AppResult<Self> {
        let code = required_text("codigo", input.codigo)?;
        let description = required_text("descricao", input.descricao)?;
        let value = money("valor", input.valor.unwrap_or(Decimal::ZERO), VALUE_DIGITS)?;
        let complexity = input.complexidade.unwrap_or_default();

        let row = sqlx::query_as::<_, Procedure>(
            r#"
            INSERT INTO procedimento (id, code, description, value, complexity, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&code)
        .bind(&description)
        .bind(value)
        .bind(complexity.as_str())
        .bind(input.ativo.unwrap_or(true))
        .fetch_one(conn)
        .await?;

        Ok(row)
    }

    async fn update(conn: &mut PgConnection, current: Self, patch: UpdateProcedure) -> AppResult<Self> {
        let code = required_text("codigo", patch.codigo.or(Some(current.code)))?;
        let description = required_text("descricao", patch.descricao.or(Some(current.description)))?;
        let value = money("valor", patch.valor.unwrap_or(current.value), VALUE_DIGITS)?;
        let complexity = patch.complexidade.unwrap_or(current.complexity);
        let active = patch.ativo.unwrap_or(current.active);

        let row = sqlx::query_as::<_, Procedure>(
            r#"
            UPDATE procedimento
            SET code = $1, description = $2, value = $3, complexity = $4, active = $5,
                updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&code)
        .bind(&description)
        .bind(value)
        .bind(complexity.as_str())
        .bind(active)
        .bind(current.id)
        .fetch_one(conn)
        .await?;

        Ok(row)
    }
}
