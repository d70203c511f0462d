//! Database models.

pub mod account;
pub mod audit;
pub mod financing_source;
pub mod occupation;
pub mod procedure;
pub mod production;
pub mod provider;

pub use account::{Account, Role};
pub use audit::{AuditAction, AuditEntry};
pub use financing_source::FinancingSource;
pub use occupation::Occupation;
pub use procedure::Procedure;
pub use production::ProductionRecord;
pub use provider::Provider;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Wire format for every date the API accepts.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A stored enum column held a value the model does not know.
#[derive(Debug, Error)]
#[error("unknown {column} value: {value}")]
pub struct UnknownValue {
    column: &'static str,
    value: String,
}

impl UnknownValue {
    pub fn new(column: &'static str, value: String) -> Self {
        Self { column, value }
    }
}

/// Non-negative money amount rounded to cents, with at most
/// `integer_digits` digits before the decimal point (the column's
/// `NUMERIC(integer_digits + 2, 2)` range).
pub fn money(field: &str, value: Decimal, integer_digits: u32) -> AppResult<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::invalid(field, "must not be negative"));
    }
    let value = value.round_dp(2);
    let limit = Decimal::from(10_i64.pow(integer_digits));
    if value >= limit {
        return Err(AppError::invalid(field, format!("must be less than {limit}")));
    }
    Ok(value)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| AppError::invalid(field, format!("invalid date '{value}', expected YYYY-MM-DD")))
}

/// Parse a UUID.
pub fn parse_id(field: &str, value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value.trim()).map_err(|_| AppError::invalid(field, format!("invalid id '{value}'")))
}
