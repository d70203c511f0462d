//! Report execution service.
//!
//! Runs the count and page statements for a compiled predicate inside one
//! read transaction with a statement timeout, and shapes rows into nested
//! JSON with one object per joined reference table.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::filter::{FilterModel, ReportField};
use super::predicate::{Predicate, compile};
use super::query_builder::{ReportQueryBuilder, field_names};
use crate::error::{AppError, AppResult};
use crate::store::record::{Page, Pagination};

/// Flat joined row as returned by the page query.
#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    competence: NaiveDate,
    realized_on: Option<NaiveDate>,
    quantity: i32,
    value: Decimal,
    diagnosis_code: Option<String>,
    cbo_ref_id: Option<Uuid>,
    cbo_code: Option<String>,
    cbo_description: Option<String>,
    prestador_ref_id: Option<Uuid>,
    prestador_code: Option<String>,
    prestador_legal_name: Option<String>,
    prestador_tax_id: Option<String>,
    procedimento_ref_id: Option<Uuid>,
    procedimento_code: Option<String>,
    procedimento_description: Option<String>,
    procedimento_value: Option<Decimal>,
    procedimento_complexity: Option<String>,
    srub_ref_id: Option<Uuid>,
    srub_code: Option<String>,
    srub_description: Option<String>,
    srub_financing_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OccupationRef {
    pub id: Uuid,
    pub codigo: String,
    pub descricao: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRef {
    pub id: Uuid,
    pub codigo: String,
    pub razao_social: String,
    pub cnpj_cpf: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcedureRef {
    pub id: Uuid,
    pub codigo: String,
    pub descricao: String,
    pub valor: Decimal,
    pub complexidade: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingSourceRef {
    pub id: Uuid,
    pub codigo: String,
    pub descricao: String,
    pub tipo_financiamento: Option<String>,
}

/// Production record with its references resolved. A missing or dangling
/// reference is `null`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub id: Uuid,
    #[serde(rename = "prdCmp")]
    pub competence: NaiveDate,
    #[serde(rename = "prdDtr")]
    pub realized_on: Option<NaiveDate>,
    #[serde(rename = "prdQtd")]
    pub quantity: i32,
    #[serde(rename = "prdVlP")]
    pub value: Decimal,
    #[serde(rename = "prdCid")]
    pub diagnosis_code: Option<String>,
    pub cbo: Option<OccupationRef>,
    pub prestador: Option<ProviderRef>,
    pub procedimento: Option<ProcedureRef>,
    pub srub: Option<FinancingSourceRef>,
}

impl From<ReportRow> for ReportRecord {
    fn from(row: ReportRow) -> Self {
        let cbo = match (row.cbo_ref_id, row.cbo_code, row.cbo_description) {
            (Some(id), Some(codigo), Some(descricao)) => Some(OccupationRef {
                id,
                codigo,
                descricao,
            }),
            _ => None,
        };
        let prestador = match (row.prestador_ref_id, row.prestador_code, row.prestador_legal_name) {
            (Some(id), Some(codigo), Some(razao_social)) => Some(ProviderRef {
                id,
                codigo,
                razao_social,
                cnpj_cpf: row.prestador_tax_id,
            }),
            _ => None,
        };
        let procedimento = match (
            row.procedimento_ref_id,
            row.procedimento_code,
            row.procedimento_description,
            row.procedimento_value,
            row.procedimento_complexity,
        ) {
            (Some(id), Some(codigo), Some(descricao), Some(valor), Some(complexidade)) => {
                Some(ProcedureRef {
                    id,
                    codigo,
                    descricao,
                    valor,
                    complexidade,
                })
            }
            _ => None,
        };
        let srub = match (row.srub_ref_id, row.srub_code, row.srub_description) {
            (Some(id), Some(codigo), Some(descricao)) => Some(FinancingSourceRef {
                id,
                codigo,
                descricao,
                tipo_financiamento: row.srub_financing_type,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            competence: row.competence,
            realized_on: row.realized_on,
            quantity: row.quantity,
            value: row.value,
            diagnosis_code: row.diagnosis_code,
            cbo,
            prestador,
            procedimento,
            srub,
        }
    }
}

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Excel,
    Pdf,
}

impl ExportFormat {
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" => Ok(ExportFormat::Excel),
            "pdf" => Ok(ExportFormat::Pdf),
            _ => Err(AppError::invalid(
                "format",
                format!("unsupported format '{value}', expected csv, excel or pdf"),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "excel",
            ExportFormat::Pdf => "pdf",
        }
    }
}

/// Body of `POST /api/reports/export`.
#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    pub format: Option<String>,
    #[serde(default)]
    pub filters: Value,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Export acknowledgement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportAck {
    pub format: ExportFormat,
    pub total: i64,
    pub row_count: usize,
    pub fields: Vec<String>,
    pub sample: Vec<Value>,
    pub message: String,
}

/// Report execution service.
#[derive(Clone)]
pub struct ReportService {
    inner: Arc<ReportServiceInner>,
}

struct ReportServiceInner {
    pool: PgPool,
    max_page_size: u32,
    statement_timeout: String,
    sample_size: usize,
}

impl ReportService {
    pub fn new(
        pool: PgPool,
        max_page_size: u32,
        statement_timeout: String,
        sample_size: usize,
    ) -> Self {
        Self {
            inner: Arc::new(ReportServiceInner {
                pool,
                max_page_size,
                statement_timeout,
                sample_size,
            }),
        }
    }

    /// Resolve page parameters against the report ceiling.
    pub fn pagination(&self, page: Option<u32>, limit: Option<u32>) -> AppResult<Pagination> {
        Pagination::resolve(page, limit, self.inner.max_page_size)
    }

    /// Compile `model` and fetch one page of joined rows.
    pub async fn data(&self, model: &FilterModel, pagination: Pagination) -> AppResult<Page<ReportRecord>> {
        let predicate = compile(model)?;
        self.run(&predicate, pagination).await
    }

    /// Execute a compiled predicate.
    pub async fn run(&self, predicate: &Predicate, pagination: Pagination) -> AppResult<Page<ReportRecord>> {
        // The builder holds a non-Send condition; render before awaiting.
        let (count_sql, page_sql) = {
            let builder = ReportQueryBuilder::new(predicate);
            (builder.build_count(), builder.build(pagination))
        };

        let mut tx = self.inner.pool.begin().await?;

        sqlx::query(&format!(
            "SET LOCAL statement_timeout = '{}'",
            self.inner.statement_timeout
        ))
        .execute(&mut *tx)
        .await?;

        let total: i64 = sqlx::query_scalar(&count_sql).fetch_one(&mut *tx).await?;

        debug!(sql = %page_sql, "report page query");
        let rows = sqlx::query_as::<_, ReportRow>(&page_sql)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page {
            data: rows.into_iter().map(ReportRecord::from).collect(),
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    /// Validate an export request, run it at the export ceiling and
    /// acknowledge it with a projected sample.
    pub async fn export(&self, request: ExportRequest) -> AppResult<ExportAck> {
        let format = match request.format.as_deref() {
            Some(f) => ExportFormat::parse(f)?,
            None => return Err(AppError::required("format")),
        };
        let fields = export_fields(request.fields)?;
        let model = FilterModel::from_value(request.filters)?;
        let predicate = compile(&model)?;

        let pagination = Pagination {
            page: 1,
            limit: self.inner.max_page_size.max(1),
        };
        let page = self.run(&predicate, pagination).await?;

        let sample = page
            .data
            .iter()
            .take(self.inner.sample_size)
            .map(|record| project(record, &fields))
            .collect::<AppResult<Vec<_>>>()?;
        let row_count = page.data.len();

        info!(
            format = format.as_str(),
            total = page.total,
            rows = row_count,
            "report export requested"
        );

        Ok(ExportAck {
            format,
            total: page.total,
            row_count,
            message: format!("export of {row_count} rows as {} accepted", format.as_str()),
            fields,
            sample,
        })
    }
}

/// Requested export fields; every report field when none are given.
fn export_fields(requested: Vec<String>) -> AppResult<Vec<String>> {
    let requested: Vec<String> = requested
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    if requested.is_empty() {
        return Ok(field_names().map(str::to_string).collect());
    }
    for field in &requested {
        if field != "id" && ReportField::from_name(field).is_none() {
            return Err(AppError::invalid("fields", format!("unknown field '{field}'")));
        }
    }
    Ok(requested)
}

/// Project a record onto the named fields.
fn project(record: &ReportRecord, fields: &[String]) -> AppResult<Value> {
    let full = serde_json::to_value(record).map_err(anyhow::Error::from)?;
    let mut out = Map::new();
    for name in fields {
        let path = match ReportField::from_name(name) {
            Some(field) => field.json_path(),
            None => vec!["id"],
        };
        let value = path
            .iter()
            .try_fold(&full, |v, key| v.get(*key))
            .cloned()
            .unwrap_or(Value::Null);
        out.insert(name.clone(), value);
    }
    Ok(Value::Object(out))
}

impl std::fmt::Debug for ReportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportService")
            .field("max_page_size", &self.inner.max_page_size)
            .field("statement_timeout", &self.inner.statement_timeout)
            .finish()
    }
}
