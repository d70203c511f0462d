//! Production record (producao) fact table.
//!
//! Each row reports a quantity and value of one procedure performed by a
//! provider in a competence month. The four reference keys are optional;
//! when present they must point at existing rows.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use super::{money, parse_date, parse_id};
use crate::error::{AppError, AppResult};
use crate::store::record::{Record, optional_text};

/// Integer digits of `producao.value` (`NUMERIC(14, 2)`).
const VALUE_DIGITS: u32 = 12;

/// Production record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductionRecord {
    pub id: Uuid,
    /// Competence (billing month).
    #[serde(rename = "prdCmp")]
    pub competence: NaiveDate,
    /// Date the procedure was performed.
    #[serde(rename = "prdDtr")]
    pub realized_on: Option<NaiveDate>,
    #[serde(rename = "prdQtd")]
    pub quantity: i32,
    /// Value reported for the record.
    #[serde(rename = "prdVlP")]
    pub value: Decimal,
    /// Primary diagnosis (CID) code.
    #[serde(rename = "prdCid")]
    pub diagnosis_code: Option<String>,
    pub cbo_id: Option<Uuid>,
    pub prestador_id: Option<Uuid>,
    pub procedimento_id: Option<Uuid>,
    pub srub_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a production record.
///
/// Dates use `YYYY-MM-DD`; reference ids are UUID strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductionRecord {
    pub prd_cmp: Option<String>,
    pub prd_dtr: Option<String>,
    pub prd_qtd: Option<i32>,
    #[serde(rename = "prdVlP")]
    pub prd_vl_p: Option<Decimal>,
    pub prd_cid: Option<String>,
    pub cbo_id: Option<String>,
    pub prestador_id: Option<String>,
    pub procedimento_id: Option<String>,
    pub srub_id: Option<String>,
}

/// Input for updating a production record.
///
/// For optional columns an empty string clears the value; an absent key
/// keeps the current one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductionRecord {
    pub prd_cmp: Option<String>,
    pub prd_dtr: Option<String>,
    pub prd_qtd: Option<i32>,
    #[serde(rename = "prdVlP")]
    pub prd_vl_p: Option<Decimal>,
    pub prd_cid: Option<String>,
    pub cbo_id: Option<String>,
    pub prestador_id: Option<String>,
    pub procedimento_id: Option<String>,
    pub srub_id: Option<String>,
}

/// Validated column values shared by insert and update.
struct Columns {
    competence: NaiveDate,
    realized_on: Option<NaiveDate>,
    quantity: i32,
    value: Decimal,
    diagnosis_code: Option<String>,
    cbo_id: Option<Uuid>,
    prestador_id: Option<Uuid>,
    procedimento_id: Option<Uuid>,
    srub_id: Option<Uuid>,
}

fn quantity(value: i32) -> AppResult<i32> {
    if value < 1 {
        return Err(AppError::invalid("prdQtd", "must be at least 1"));
    }
    Ok(value)
}

/// Parse an optional reference; blank means "no reference".
fn reference(field: &str, value: Option<String>) -> AppResult<Option<Uuid>> {
    optional_text(value)
        .map(|v| parse_id(field, &v))
        .transpose()
}

/// Patch semantics for an optional reference column.
fn patch_reference(field: &str, patch: Option<String>, current: Option<Uuid>) -> AppResult<Option<Uuid>> {
    match patch {
        Some(value) => reference(field, Some(value)),
        None => Ok(current),
    }
}

impl Columns {
    fn from_create(input: CreateProductionRecord) -> AppResult<Self> {
        let competence = match optional_text(input.prd_cmp) {
            Some(v) => parse_date("prdCmp", &v)?,
            None => return Err(AppError::required("prdCmp")),
        };
        let realized_on = optional_text(input.prd_dtr)
            .map(|v| parse_date("prdDtr", &v))
            .transpose()?;

        Ok(Self {
            competence,
            realized_on,
            quantity: quantity(input.prd_qtd.unwrap_or(1))?,
            value: money("prdVlP", input.prd_vl_p.unwrap_or(Decimal::ZERO), VALUE_DIGITS)?,
            diagnosis_code: optional_text(input.prd_cid),
            cbo_id: reference("cboId", input.cbo_id)?,
            prestador_id: reference("prestadorId", input.prestador_id)?,
            procedimento_id: reference("procedimentoId", input.procedimento_id)?,
            srub_id: reference("srubId", input.srub_id)?,
        })
    }

    fn merge(current: ProductionRecord, patch: UpdateProductionRecord) -> AppResult<Self> {
        let competence = match patch.prd_cmp {
            Some(v) => match optional_text(Some(v)) {
                Some(v) => parse_date("prdCmp", &v)?,
                None => return Err(AppError::required("prdCmp")),
            },
            None => current.competence,
        };
        let realized_on = match patch.prd_dtr {
            Some(v) => optional_text(Some(v))
                .map(|v| parse_date("prdDtr", &v))
                .transpose()?,
            None => current.realized_on,
        };
        let diagnosis_code = match patch.prd_cid {
            Some(v) => optional_text(Some(v)),
            None => current.diagnosis_code,
        };

        Ok(Self {
            competence,
            realized_on,
            quantity: quantity(patch.prd_qtd.unwrap_or(current.quantity))?,
            value: money("prdVlP", patch.prd_vl_p.unwrap_or(current.value), VALUE_DIGITS)?,
            diagnosis_code,
            cbo_id: patch_reference("cboId", patch.cbo_id, current.cbo_id)?,
            prestador_id: patch_reference("prestadorId", patch.prestador_id, current.prestador_id)?,
            procedimento_id: patch_reference(
                "procedimentoId",
                patch.procedimento_id,
                current.procedimento_id,
            )?,
            srub_id: patch_reference("srubId", patch.srub_id, current.srub_id)?,
        })
    }
}

#[async_trait]
impl Record for ProductionRecord {
    const TABLE: &'static str = "producao";
    const SEARCH_COLUMNS: &'static [&'static str] = &["diagnosis_code"];

    type Create = CreateProductionRecord;
    type Patch = UpdateProductionRecord;

    fn id(&self) -> Uuid {
        self.id
    }

    async fn insert(conn: &mut PgConnection, input: CreateProductionRecord) -> AppResult<Self> {
        let c = Columns::from_create(input)?;

        let row = sqlx::query_as::<_, ProductionRecord>(
            r#"
            INSERT INTO producao (id, competence, realized_on, quantity, value, diagnosis_code,
                                  cbo_id, prestador_id, procedimento_id, srub_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(c.competence)
        .bind(c.realized_on)
        .bind(c.quantity)
        .bind(c.value)
        .bind(&c.diagnosis_code)
        .bind(c.cbo_id)
        .bind(c.prestador_id)
        .bind(c.procedimento_id)
        .bind(c.srub_id)
        .fetch_one(conn)
        .await?;

        Ok(row)
    }

    async fn update(
        conn: &mut PgConnection,
        current: Self,
        patch: UpdateProductionRecord,
    ) -> AppResult<Self> {
        let id = current.id;
        let c = Columns::merge(current, patch)?;

        let row = sqlx::query_as::<_, ProductionRecord>(
            r#"
            UPDATE producao
            SET competence = $1, realized_on = $2, quantity = $3, value = $4,
                diagnosis_code = $5, cbo_id = $6, prestador_id = $7, procedimento_id = $8,
                srub_id = $9, updated_at = NOW()
            WHERE id = $10
            RETURNING *
            "#,
        )
        .bind(c.competence)
        .bind(c.realized_on)
        .bind(c.quantity)
        .bind(c.value)
        .bind(&c.diagnosis_code)
        .bind(c.cbo_id)
        .bind(c.prestador_id)
        .bind(c.procedimento_id)
        .bind(c.srub_id)
        .bind(id)
        .fetch_one(conn)
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn record() -> ProductionRecord {
        ProductionRecord {
            id: Uuid::nil(),
            competence: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            realized_on: None,
            quantity: 2,
            value: Decimal::new(2000, 2),
            diagnosis_code: Some("J45".to_string()),
            cbo_id: None,
            prestador_id: Some(Uuid::nil()),
            procedimento_id: None,
            srub_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn create_requires_competence() {
        let err = Columns::from_create(CreateProductionRecord::default())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "prdCmp is required");
    }

    #[test]
    fn create_rejects_malformed_date() {
        let input = CreateProductionRecord {
            prd_cmp: Some("2024-13-01".to_string()),
            ..Default::default()
        };
        let err = Columns::from_create(input).err().unwrap();
        assert!(err.to_string().starts_with("prdCmp"), "{err}");
    }

    #[test]
    fn create_defaults_and_blank_references() {
        let input = CreateProductionRecord {
            prd_cmp: Some("2024-03-01".to_string()),
            prestador_id: Some(String::new()),
            ..Default::default()
        };
        let c = Columns::from_create(input).unwrap();
        assert_eq!(c.quantity, 1);
        assert_eq!(c.value, Decimal::ZERO);
        assert_eq!(c.prestador_id, None);
    }

    #[test]
    fn create_rejects_zero_quantity_and_bad_reference() {
        let input = CreateProductionRecord {
            prd_cmp: Some("2024-03-01".to_string()),
            prd_qtd: Some(0),
            ..Default::default()
        };
        assert!(Columns::from_create(input).is_err());

        let input = CreateProductionRecord {
            prd_cmp: Some("2024-03-01".to_string()),
            procedimento_id: Some("not-a-uuid".to_string()),
            ..Default::default()
        };
        let err = Columns::from_create(input).err().unwrap();
        assert!(err.to_string().starts_with("procedimentoId"), "{err}");
    }

    #[test]
    fn merge_keeps_absent_and_clears_blank() {
        let patch = UpdateProductionRecord {
            prd_qtd: Some(5),
            prd_cid: Some(String::new()),
            prestador_id: Some(String::new()),
            ..Default::default()
        };
        let c = Columns::merge(record(), patch).unwrap();
        assert_eq!(c.quantity, 5);
        assert_eq!(c.value, Decimal::new(2000, 2));
        assert_eq!(c.diagnosis_code, None);
        assert_eq!(c.prestador_id, None);
        assert_eq!(c.competence, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn merge_rejects_blank_competence() {
        let patch = UpdateProductionRecord {
            prd_cmp: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(Columns::merge(record(), patch).is_err());
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["prdCmp"], "2024-03-01");
        assert_eq!(json["prdQtd"], 2);
        assert_eq!(json["prdVlP"], "20.00");
        assert_eq!(json["prdCid"], "J45");
        assert!(json.get("prestadorId").is_some());
    }
}
