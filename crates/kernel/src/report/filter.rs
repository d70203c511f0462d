//! Report filter model.
//!
//! A filter is the four legacy keys (`dateFrom`, `dateTo`, `prestador`,
//! `procedimento`) plus an ordered list of clauses. Clients send the clause
//! list as an index map (`{"0": {...}, "1": {...}}`), as a plain array, or
//! under a `clauses` key; all three shapes parse to the same model.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// Value kind of a filterable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Date,
    Integer,
    Decimal,
    Text,
    Id,
}

/// Fields a report can be filtered and projected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportField {
    Competence,
    RealizedOn,
    Quantity,
    Value,
    DiagnosisCode,
    Occupation,
    Provider,
    Procedure,
    FinancingSource,
    OccupationCode,
    OccupationDescription,
    ProviderCode,
    ProviderLegalName,
    ProviderTaxId,
    ProcedureCode,
    ProcedureDescription,
    ProcedureComplexity,
    ProcedureValue,
    FinancingSourceCode,
    FinancingSourceDescription,
}

impl ReportField {
    pub const ALL: [ReportField; 20] = [
        ReportField::Competence,
        ReportField::RealizedOn,
        ReportField::Quantity,
        ReportField::Value,
        ReportField::DiagnosisCode,
        ReportField::Occupation,
        ReportField::Provider,
        ReportField::Procedure,
        ReportField::FinancingSource,
        ReportField::OccupationCode,
        ReportField::OccupationDescription,
        ReportField::ProviderCode,
        ReportField::ProviderLegalName,
        ReportField::ProviderTaxId,
        ReportField::ProcedureCode,
        ReportField::ProcedureDescription,
        ReportField::ProcedureComplexity,
        ReportField::ProcedureValue,
        ReportField::FinancingSourceCode,
        ReportField::FinancingSourceDescription,
    ];

    /// Name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ReportField::Competence => "prdCmp",
            ReportField::RealizedOn => "prdDtr",
            ReportField::Quantity => "prdQtd",
            ReportField::Value => "prdVlP",
            ReportField::DiagnosisCode => "prdCid",
            ReportField::Occupation => "cbo",
            ReportField::Provider => "prestador",
            ReportField::Procedure => "procedimento",
            ReportField::FinancingSource => "srub",
            ReportField::OccupationCode => "cbo.codigo",
            ReportField::OccupationDescription => "cbo.descricao",
            ReportField::ProviderCode => "prestador.codigo",
            ReportField::ProviderLegalName => "prestador.razaoSocial",
            ReportField::ProviderTaxId => "prestador.cnpjCpf",
            ReportField::ProcedureCode => "procedimento.codigo",
            ReportField::ProcedureDescription => "procedimento.descricao",
            ReportField::ProcedureComplexity => "procedimento.complexidade",
            ReportField::ProcedureValue => "procedimento.valor",
            ReportField::FinancingSourceCode => "srub.codigo",
            ReportField::FinancingSourceDescription => "srub.descricao",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            ReportField::Competence | ReportField::RealizedOn => FieldKind::Date,
            ReportField::Quantity => FieldKind::Integer,
            ReportField::Value | ReportField::ProcedureValue => FieldKind::Decimal,
            ReportField::Occupation
            | ReportField::Provider
            | ReportField::Procedure
            | ReportField::FinancingSource => FieldKind::Id,
            _ => FieldKind::Text,
        }
    }

    /// Table alias and column the field reads from.
    pub fn column(&self) -> (&'static str, &'static str) {
        match self {
            ReportField::Competence => ("p", "competence"),
            ReportField::RealizedOn => ("p", "realized_on"),
            ReportField::Quantity => ("p", "quantity"),
            ReportField::Value => ("p", "value"),
            ReportField::DiagnosisCode => ("p", "diagnosis_code"),
            ReportField::Occupation => ("p", "cbo_id"),
            ReportField::Provider => ("p", "prestador_id"),
            ReportField::Procedure => ("p", "procedimento_id"),
            ReportField::FinancingSource => ("p", "srub_id"),
            ReportField::OccupationCode => ("c", "code"),
            ReportField::OccupationDescription => ("c", "description"),
            ReportField::ProviderCode => ("pr", "code"),
            ReportField::ProviderLegalName => ("pr", "legal_name"),
            ReportField::ProviderTaxId => ("pr", "tax_id"),
            ReportField::ProcedureCode => ("pc", "code"),
            ReportField::ProcedureDescription => ("pc", "description"),
            ReportField::ProcedureComplexity => ("pc", "complexity"),
            ReportField::ProcedureValue => ("pc", "value"),
            ReportField::FinancingSourceCode => ("s", "code"),
            ReportField::FinancingSourceDescription => ("s", "description"),
        }
    }

    /// Path of the field inside a serialized report row.
    pub fn json_path(&self) -> Vec<&'static str> {
        match self {
            ReportField::Occupation
            | ReportField::Provider
            | ReportField::Procedure
            | ReportField::FinancingSource => vec![self.name(), "id"],
            _ => self.name().split('.').collect(),
        }
    }
}

/// Comparison operator of a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Between,
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::GreaterThan => "greaterThan",
            Operator::LessThan => "lessThan",
            Operator::Between => "between",
        }
    }

    /// Parse an operator name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        [
            Operator::Equals,
            Operator::Contains,
            Operator::StartsWith,
            Operator::EndsWith,
            Operator::GreaterThan,
            Operator::LessThan,
            Operator::Between,
        ]
        .into_iter()
        .find(|op| op.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn accepts(&self, kind: FieldKind) -> bool {
        match self {
            Operator::Equals => true,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith => kind == FieldKind::Text,
            Operator::GreaterThan | Operator::LessThan | Operator::Between => kind != FieldKind::Id,
        }
    }
}

/// How a clause joins the predicate accumulated before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    fn parse(value: Option<&str>) -> AppResult<Self> {
        match value.map(str::trim) {
            None | Some("") => Ok(Connector::And),
            Some(v) if v.eq_ignore_ascii_case("and") => Ok(Connector::And),
            Some(v) if v.eq_ignore_ascii_case("or") => Ok(Connector::Or),
            Some(v) => Err(AppError::invalid(
                "logicalOperator",
                format!("unknown connector '{v}'"),
            )),
        }
    }
}

/// Clause as sent by the client, before type checking.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClause {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub logical_operator: Option<String>,
}

/// Clause value, either scalar or a `[low, high]` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseValue {
    Scalar(String),
    Range(Option<String>, Option<String>),
}

/// A clause with a non-empty field and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: String,
    pub operator: String,
    pub value: ClauseValue,
    pub connector: Connector,
}

/// Parsed filter model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterModel {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub prestador: Option<String>,
    pub procedimento: Option<String>,
    pub clauses: Vec<Clause>,
}

impl FilterModel {
    /// Parse the `filters` query parameter.
    pub fn from_json(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AppError::invalid("filters", format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> AppResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(raw) => Self::from_json(&raw),
            Value::Array(items) => Ok(Self {
                clauses: parse_clauses(items)?,
                ..Self::default()
            }),
            Value::Object(map) => Self::from_object(map),
            _ => Err(AppError::invalid("filters", "expected an object or an array")),
        }
    }

    fn from_object(mut map: Map<String, Value>) -> AppResult<Self> {
        let mut model = Self {
            date_from: legacy_text(map.remove("dateFrom")),
            date_to: legacy_text(map.remove("dateTo")),
            prestador: legacy_text(map.remove("prestador")),
            procedimento: legacy_text(map.remove("procedimento")),
            clauses: Vec::new(),
        };

        let mut raw = match map.remove("clauses") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(Value::Object(indexed)) => indexed_values(indexed),
            Some(_) => return Err(AppError::invalid("clauses", "expected an array")),
        };
        raw.extend(indexed_values(map));

        model.clauses = parse_clauses(raw)?;
        Ok(model)
    }

    /// Fill legacy keys the JSON body left unset.
    pub fn with_legacy_defaults(
        mut self,
        date_from: Option<String>,
        date_to: Option<String>,
        prestador: Option<String>,
        procedimento: Option<String>,
    ) -> Self {
        self.date_from = self.date_from.or_else(|| legacy_text(date_from.map(Value::String)));
        self.date_to = self.date_to.or_else(|| legacy_text(date_to.map(Value::String)));
        self.prestador = self.prestador.or_else(|| legacy_text(prestador.map(Value::String)));
        self.procedimento = self
            .procedimento
            .or_else(|| legacy_text(procedimento.map(Value::String)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.date_from.is_none()
            && self.date_to.is_none()
            && self.prestador.is_none()
            && self.procedimento.is_none()
            && self.clauses.is_empty()
    }
}

/// Clause objects keyed by their decimal index, in index order. Keys that
/// are not indexes are ignored.
fn indexed_values(map: Map<String, Value>) -> Vec<Value> {
    let mut entries: Vec<(u32, Value)> = map
        .into_iter()
        .filter_map(|(key, value)| key.parse::<u32>().ok().map(|i| (i, value)))
        .collect();
    entries.sort_by_key(|(i, _)| *i);
    entries.into_iter().map(|(_, v)| v).collect()
}

fn parse_clauses(items: Vec<Value>) -> AppResult<Vec<Clause>> {
    let mut clauses = Vec::with_capacity(items.len());
    for item in items {
        let raw: RawClause = serde_json::from_value(item)
            .map_err(|e| AppError::invalid("filters", format!("malformed clause: {e}")))?;
        if let Some(clause) = normalize(raw)? {
            clauses.push(clause);
        }
    }
    Ok(clauses)
}

/// Drop clauses without a field or value; keep the rest as text.
fn normalize(raw: RawClause) -> AppResult<Option<Clause>> {
    let Some(field) = raw.field.map(|f| f.trim().to_string()).filter(|f| !f.is_empty()) else {
        return Ok(None);
    };
    let value = match raw.value {
        Value::Array(items) => {
            let mut sides = items.into_iter().map(|v| scalar_text(&v));
            let low = sides.next().flatten();
            let high = sides.next().flatten();
            if low.is_none() && high.is_none() {
                return Ok(None);
            }
            ClauseValue::Range(low, high)
        }
        other => match scalar_text(&other) {
            Some(v) => ClauseValue::Scalar(v),
            None => return Ok(None),
        },
    };
    let operator = raw
        .operator
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .unwrap_or_else(|| Operator::Equals.name().to_string());

    Ok(Some(Clause {
        field,
        operator,
        value,
        connector: Connector::parse(raw.logical_operator.as_deref())?,
    }))
}

/// Text form of a scalar JSON value; blank and non-scalar values are `None`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn legacy_text(value: Option<Value>) -> Option<String> {
    value.as_ref().and_then(scalar_text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clause(field: &str, operator: &str, value: &str, connector: Connector) -> Clause {
        Clause {
            field: field.to_string(),
            operator: operator.to_string(),
            value: ClauseValue::Scalar(value.to_string()),
            connector,
        }
    }

    #[test]
    fn three_wire_shapes_agree() {
        let a = json!({"field": "prdCid", "operator": "contains", "value": "J4"});
        let b = json!({"field": "prdQtd", "operator": "greaterThan", "value": 1, "logicalOperator": "or"});

        let indexed = FilterModel::from_value(json!({"1": b.clone(), "0": a.clone()})).unwrap();
        let array = FilterModel::from_value(json!([a.clone(), b.clone()])).unwrap();
        let wrapped = FilterModel::from_value(json!({"clauses": [a, b]})).unwrap();

        assert_eq!(indexed, array);
        assert_eq!(array, wrapped);
        assert_eq!(
            array.clauses,
            vec![
                clause("prdCid", "contains", "J4", Connector::And),
                clause("prdQtd", "greaterThan", "1", Connector::Or),
            ]
        );
    }

    #[test]
    fn index_order_is_numeric() {
        let mut map = Map::new();
        for i in 0..11 {
            map.insert(
                i.to_string(),
                json!({"field": "prdCid", "operator": "equals", "value": format!("v{i}")}),
            );
        }
        let model = FilterModel::from_value(Value::Object(map)).unwrap();
        let values: Vec<_> = model
            .clauses
            .iter()
            .map(|c| match &c.value {
                ClauseValue::Scalar(v) => v.clone(),
                ClauseValue::Range(..) => unreachable!(),
            })
            .collect();
        assert_eq!(values[2], "v2");
        assert_eq!(values[10], "v10");
    }

    #[test]
    fn legacy_keys_sit_beside_clauses() {
        let model = FilterModel::from_value(json!({
            "dateFrom": "2024-01-01",
            "dateTo": "",
            "prestador": "0192f0a0-0000-7000-8000-000000000001",
            "0": {"field": "srub.codigo", "operator": "equals", "value": "01"}
        }))
        .unwrap();

        assert_eq!(model.date_from.as_deref(), Some("2024-01-01"));
        assert_eq!(model.date_to, None);
        assert!(model.prestador.is_some());
        assert_eq!(model.clauses.len(), 1);
    }

    #[test]
    fn empty_clauses_are_dropped() {
        let model = FilterModel::from_value(json!([
            {"field": "", "operator": "equals", "value": "x"},
            {"field": "prdCid", "operator": "equals", "value": ""},
            {"field": "prdCid", "operator": "equals", "value": null},
            {"field": "prdCmp", "operator": "between", "value": ["", ""]},
            {"field": "prdCid", "operator": "equals", "value": "A00"}
        ]))
        .unwrap();
        assert_eq!(model.clauses.len(), 1);
        assert!(FilterModel::from_value(json!({})).unwrap().is_empty());
        assert!(FilterModel::from_json("").unwrap().is_empty());
    }

    #[test]
    fn half_empty_range_is_kept() {
        let model = FilterModel::from_value(json!([
            {"field": "prdCmp", "operator": "between", "value": ["2024-01-01", ""]}
        ]))
        .unwrap();
        assert_eq!(
            model.clauses[0].value,
            ClauseValue::Range(Some("2024-01-01".to_string()), None)
        );
    }

    #[test]
    fn connector_is_case_insensitive_and_defaults_to_and() {
        assert_eq!(Connector::parse(Some("OR")).unwrap(), Connector::Or);
        assert_eq!(Connector::parse(Some("And")).unwrap(), Connector::And);
        assert_eq!(Connector::parse(None).unwrap(), Connector::And);
        assert!(Connector::parse(Some("xor")).is_err());
    }

    #[test]
    fn invalid_json_names_filters() {
        let err = FilterModel::from_json("{not json").unwrap_err();
        assert!(err.to_string().starts_with("filters:"), "{err}");
        let err = FilterModel::from_value(json!("text")).unwrap_err();
        assert!(err.to_string().starts_with("filters:"), "{err}");
    }

    #[test]
    fn query_string_legacy_keys_fill_gaps() {
        let model = FilterModel::from_value(json!({"dateFrom": "2024-02-01"}))
            .unwrap()
            .with_legacy_defaults(
                Some("2023-01-01".to_string()),
                Some("2024-12-31".to_string()),
                None,
                Some(" ".to_string()),
            );
        assert_eq!(model.date_from.as_deref(), Some("2024-02-01"));
        assert_eq!(model.date_to.as_deref(), Some("2024-12-31"));
        assert_eq!(model.procedimento, None);
    }

    #[test]
    fn field_catalogue() {
        for field in ReportField::ALL {
            assert_eq!(ReportField::from_name(field.name()), Some(field));
        }
        assert_eq!(ReportField::from_name("prestador.codigo"), Some(ReportField::ProviderCode));
        assert_eq!(ReportField::Provider.json_path(), vec!["prestador", "id"]);
        assert_eq!(ReportField::ProviderLegalName.json_path(), vec!["prestador", "razaoSocial"]);
        assert_eq!(ReportField::from_name("senha"), None);
    }

    #[test]
    fn operator_compatibility() {
        assert_eq!(Operator::parse("STARTSWITH"), Some(Operator::StartsWith));
        assert_eq!(Operator::parse("like"), None);
        assert!(Operator::Equals.accepts(FieldKind::Id));
        assert!(!Operator::Contains.accepts(FieldKind::Date));
        assert!(Operator::Between.accepts(FieldKind::Text));
        assert!(!Operator::GreaterThan.accepts(FieldKind::Id));
    }
}
