//! Provider (prestador) reference table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use super::UnknownValue;
use crate::error::AppResult;
use crate::store::record::{Record, optional_text, required_text};

/// Legal nature of a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonType {
    /// Individual (CPF).
    Fisica,
    /// Organization (CNPJ).
    #[default]
    Juridica,
}

impl PersonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonType::Fisica => "fisica",
            PersonType::Juridica => "juridica",
        }
    }
}

impl TryFrom<String> for PersonType {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "fisica" => Ok(PersonType::Fisica),
            "juridica" => Ok(PersonType::Juridica),
            _ => Err(UnknownValue::new("person_type", value)),
        }
    }
}

/// Provider record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: Uuid,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "razaoSocial")]
    pub legal_name: String,
    #[serde(rename = "cnpjCpf")]
    pub tax_id: Option<String>,
    #[serde(rename = "tipoPessoa")]
    #[sqlx(try_from = "String")]
    pub person_type: PersonType,
    #[serde(rename = "ativo")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a provider.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProvider {
    pub codigo: Option<String>,
    pub razao_social: Option<String>,
    pub cnpj_cpf: Option<String>,
    pub tipo_pessoa: Option<PersonType>,
    pub ativo: Option<bool>,
}

/// Input for updating a provider.
///
/// `cnpjCpf` set to an empty string clears the tax id.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProvider {
    pub codigo: Option<String>,
    pub razao_social: Option<String>,
    pub cnpj_cpf: Option<String>,
    pub tipo_pessoa: Option<PersonType>,
    pub ativo: Option<bool>,
}

#[async_trait]
impl Record for Provider {
    const TABLE: &'static str = "prestador";
    const SEARCH_COLUMNS: &'static [&'static str] = &["code", "legal_name", "tax_id"];

    type Create = CreateProvider;
    type Patch = UpdateProvider;

    fn id(&self) -> Uuid {
        self.id
    }

    async fn insert(conn: &mut PgConnection, input: CreateProvider) -> AppResult<Self> {
        let code = required_text("codigo", input.codigo)?;
        let legal_name = required_text("razaoSocial", input.razao_social)?;
        let tax_id = optional_text(input.cnpj_cpf);
        let person_type = input.tipo_pessoa.unwrap_or_default();

        let row = sqlx::query_as::<_, Provider>(
            r#"
            INSERT INTO prestador (id, code, legal_name, tax_id, person_type, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&code)
        .bind(&legal_name)
        .bind(&tax_id)
        .bind(person_type.as_str())
        .bind(input.ativo.unwrap_or(true))
        .fetch_one(conn)
        .await?;

        Ok(row)
    }

    async fn update(conn: &mut PgConnection, current: Self, patch: UpdateProvider) -> AppResult<Self> {
        let code = required_text("codigo", patch.codigo.or(Some(current.code)))?;
        let legal_name = required_text("razaoSocial", patch.razao_social.or(Some(current.legal_name)))?;
        let tax_id = match patch.cnpj_cpf {
            Some(value) => optional_text(Some(value)),
            None => current.tax_id,
        };
        let person_type = patch.tipo_pessoa.unwrap_or(current.person_type);
        let active = patch.ativo.unwrap_or(current.active);

        let row = sqlx::query_as::<_, Provider>(
            r#"
            UPDATE prestador
            SET code = $1, legal_name = $2, tax_id = $3, person_type = $4, active = $5,
                updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&code)
        .bind(&legal_name)
        .bind(&tax_id)
        .bind(person_type.as_str())
        .bind(active)
        .bind(current.id)
        .fetch_one(conn)
        .await?;

        Ok(row)
    }
}
