//! Storage-independent predicate tree.
//!
//! [`compile`] type-checks a [`FilterModel`] into a [`Predicate`]; the query
//! builder lowers the tree to SQL afterwards.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::filter::{Clause, ClauseValue, Connector, FieldKind, FilterModel, Operator, ReportField};
use crate::error::{AppError, AppResult};
use crate::models::{parse_date, parse_id};

/// Typed comparison value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Date(NaiveDate),
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Id(Uuid),
}

/// Test applied to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Test {
    Equals(Operand),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    GreaterThan(Operand),
    LessThan(Operand),
    AtLeast(Operand),
    AtMost(Operand),
    Between(Operand, Operand),
}

/// One field test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: ReportField,
    pub test: Test,
}

/// Boolean combination of conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every row.
    All,
    Test(Condition),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn test(field: ReportField, test: Test) -> Self {
        Predicate::Test(Condition { field, test })
    }

    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (a, b) => Predicate::And(Box::new(a), Box::new(b)),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::All, _) | (_, Predicate::All) => Predicate::All,
            (a, b) => Predicate::Or(Box::new(a), Box::new(b)),
        }
    }

    fn join(self, connector: Connector, other: Predicate) -> Self {
        match connector {
            Connector::And => self.and(other),
            Connector::Or => self.or(other),
        }
    }
}

/// Compile a filter model.
///
/// Legacy keys are ANDed together; clauses fold left to right, each joined
/// to the accumulated tree by its own connector (the first clause's
/// connector is ignored); the two parts are then ANDed.
pub fn compile(model: &FilterModel) -> AppResult<Predicate> {
    let mut legacy = Predicate::All;
    if let Some(v) = &model.date_from {
        legacy = legacy.and(Predicate::test(
            ReportField::Competence,
            Test::AtLeast(Operand::Date(parse_date("dateFrom", v)?)),
        ));
    }
    if let Some(v) = &model.date_to {
        legacy = legacy.and(Predicate::test(
            ReportField::Competence,
            Test::AtMost(Operand::Date(parse_date("dateTo", v)?)),
        ));
    }
    if let Some(v) = &model.prestador {
        legacy = legacy.and(Predicate::test(
            ReportField::Provider,
            Test::Equals(Operand::Id(parse_id("prestador", v)?)),
        ));
    }
    if let Some(v) = &model.procedimento {
        legacy = legacy.and(Predicate::test(
            ReportField::Procedure,
            Test::Equals(Operand::Id(parse_id("procedimento", v)?)),
        ));
    }

    let mut folded: Option<Predicate> = None;
    for clause in &model.clauses {
        let next = compile_clause(clause)?;
        folded = Some(match folded {
            None => next,
            Some(acc) => acc.join(clause.connector, next),
        });
    }

    Ok(legacy.and(folded.unwrap_or(Predicate::All)))
}

fn compile_clause(clause: &Clause) -> AppResult<Predicate> {
    let name = clause.field.as_str();
    let field = ReportField::from_name(name)
        .ok_or_else(|| AppError::invalid(name, "unknown field"))?;
    let operator = Operator::parse(&clause.operator).ok_or_else(|| {
        AppError::invalid(name, format!("unknown operator '{}'", clause.operator))
    })?;
    let kind = field.kind();
    if !operator.accepts(kind) {
        return Err(AppError::invalid(
            name,
            format!("operator '{}' does not apply to this field", operator.name()),
        ));
    }

    let test = match (operator, &clause.value) {
        (Operator::Between, ClauseValue::Range(low, high)) => {
            let low = low.as_deref().map(|v| operand(name, kind, v)).transpose()?;
            let high = high.as_deref().map(|v| operand(name, kind, v)).transpose()?;
            match (low, high) {
                (Some(low), Some(high)) => Test::Between(low, high),
                (Some(low), None) => Test::AtLeast(low),
                (None, Some(high)) => Test::AtMost(high),
                (None, None) => return Ok(Predicate::All),
            }
        }
        (Operator::Between, ClauseValue::Scalar(_)) => {
            return Err(AppError::invalid(name, "between expects [low, high]"));
        }
        (_, ClauseValue::Range(..)) => {
            return Err(AppError::invalid(
                name,
                format!("operator '{}' expects a single value", operator.name()),
            ));
        }
        (Operator::Equals, ClauseValue::Scalar(v)) => Test::Equals(operand(name, kind, v)?),
        (Operator::Contains, ClauseValue::Scalar(v)) => Test::Contains(v.clone()),
        (Operator::StartsWith, ClauseValue::Scalar(v)) => Test::StartsWith(v.clone()),
        (Operator::EndsWith, ClauseValue::Scalar(v)) => Test::EndsWith(v.clone()),
        (Operator::GreaterThan, ClauseValue::Scalar(v)) => Test::GreaterThan(operand(name, kind, v)?),
        (Operator::LessThan, ClauseValue::Scalar(v)) => Test::LessThan(operand(name, kind, v)?),
    };

    Ok(Predicate::test(field, test))
}

fn operand(field: &str, kind: FieldKind, value: &str) -> AppResult<Operand> {
    match kind {
        FieldKind::Date => parse_date(field, value).map(Operand::Date),
        FieldKind::Integer => value
            .trim()
            .parse::<i64>()
            .map(Operand::Integer)
            .map_err(|_| AppError::invalid(field, format!("invalid integer '{value}'"))),
        FieldKind::Decimal => value
            .trim()
            .parse::<Decimal>()
            .map(Operand::Decimal)
            .map_err(|_| AppError::invalid(field, format!("invalid number '{value}'"))),
        FieldKind::Text => Ok(Operand::Text(value.to_string())),
        FieldKind::Id => parse_id(field, value).map(Operand::Id),
    }
}
