//! Report query builder using SeaQuery.
//!
//! Lowers a [`Predicate`] to a SeaQuery condition and renders the joined
//! page and count statements over `producao`.

use sea_query::{
    Alias, Asterisk, Cond, Expr, ExprTrait, Func, JoinType, Order, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr,
};

use super::filter::ReportField;
use super::predicate::{Condition, Operand, Predicate, Test};
use crate::store::record::{Pagination, escape_like_wildcards};

/// Joined reference tables: (table, alias, foreign key on `producao`).
const JOINS: [(&str, &str, &str); 4] = [
    ("cbo", "c", "cbo_id"),
    ("prestador", "pr", "prestador_id"),
    ("procedimento", "pc", "procedimento_id"),
    ("srub", "s", "srub_id"),
];

/// Selected columns: (alias, column, output name).
const COLUMNS: [(&str, &str, &str); 22] = [
    ("p", "id", "id"),
    ("p", "competence", "competence"),
    ("p", "realized_on", "realized_on"),
    ("p", "quantity", "quantity"),
    ("p", "value", "value"),
    ("p", "diagnosis_code", "diagnosis_code"),
    ("c", "id", "cbo_ref_id"),
    ("c", "code", "cbo_code"),
    ("c", "description", "cbo_description"),
    ("pr", "id", "prestador_ref_id"),
    ("pr", "code", "prestador_code"),
    ("pr", "legal_name", "prestador_legal_name"),
    ("pr", "tax_id", "prestador_tax_id"),
    ("pc", "id", "procedimento_ref_id"),
    ("pc", "code", "procedimento_code"),
    ("pc", "description", "procedimento_description"),
    ("pc", "value", "procedimento_value"),
    ("pc", "complexity", "procedimento_complexity"),
    ("s", "id", "srub_ref_id"),
    ("s", "code", "srub_code"),
    ("s", "description", "srub_description"),
    ("s", "financing_type", "srub_financing_type"),
];

/// Builds report SQL for one compiled predicate.
pub struct ReportQueryBuilder {
    condition: Option<Cond>,
}

impl ReportQueryBuilder {
    pub fn new(predicate: &Predicate) -> Self {
        Self {
            condition: lower(predicate),
        }
    }

    /// Page query: joined rows ordered newest competence first.
    pub fn build(&self, pagination: Pagination) -> String {
        let mut query = Query::select();

        for (alias, column, output) in COLUMNS {
            query.expr_as(col(alias, column), Alias::new(output));
        }

        self.add_from(&mut query);

        query
            .order_by((Alias::new("p"), Alias::new("competence")), Order::Desc)
            .order_by((Alias::new("p"), Alias::new("created_at")), Order::Desc)
            .order_by((Alias::new("p"), Alias::new("id")), Order::Asc)
            .limit(u64::from(pagination.limit))
            .offset(pagination.offset());

        query.to_string(PostgresQueryBuilder)
    }

    /// Count of every row the predicate matches.
    pub fn build_count(&self) -> String {
        let mut query = Query::select();
        query.expr(Expr::col(Asterisk).count());
        self.add_from(&mut query);
        query.to_string(PostgresQueryBuilder)
    }

    /// FROM, joins and WHERE shared by both statements.
    fn add_from(&self, query: &mut SelectStatement) {
        query.from_as(Alias::new("producao"), Alias::new("p"));

        for (table, alias, foreign_key) in JOINS {
            query.join_as(
                JoinType::LeftJoin,
                Alias::new(table),
                Alias::new(alias),
                Expr::col((Alias::new("p"), Alias::new(foreign_key)))
                    .equals((Alias::new(alias), Alias::new("id"))),
            );
        }

        if let Some(ref condition) = self.condition {
            query.cond_where(condition.clone());
        }
    }
}

fn col(alias: &str, column: &str) -> SimpleExpr {
    Expr::col((Alias::new(alias), Alias::new(column))).into()
}

/// Lower a predicate; `None` means no WHERE clause.
///
/// Runs of the same connector flatten into one condition group, so
/// parentheses only appear where AND and OR meet.
pub fn lower(predicate: &Predicate) -> Option<Cond> {
    match predicate {
        Predicate::All => None,
        Predicate::Test(condition) => Some(Cond::all().add(condition_expr(condition))),
        Predicate::And(..) => Some(group(Cond::all(), true, predicate)),
        Predicate::Or(..) => Some(group(Cond::any(), false, predicate)),
    }
}

/// Add `predicate` to `cond`, an AND group when `conjunction` is set.
fn group(cond: Cond, conjunction: bool, predicate: &Predicate) -> Cond {
    match predicate {
        Predicate::All => cond,
        Predicate::Test(condition) => cond.add(condition_expr(condition)),
        Predicate::And(a, b) if conjunction => group(group(cond, true, a), true, b),
        Predicate::Or(a, b) if !conjunction => group(group(cond, false, a), false, b),
        Predicate::And(..) => cond.add(group(Cond::all(), true, predicate)),
        Predicate::Or(..) => cond.add(group(Cond::any(), false, predicate)),
    }
}

fn condition_expr(condition: &Condition) -> SimpleExpr {
    let (alias, column) = condition.field.column();
    let field = col(alias, column);

    match &condition.test {
        Test::Equals(v) => field.eq(value(v)),
        Test::Contains(s) => lowered(alias, column).like(format!("%{}%", pattern(s))),
        Test::StartsWith(s) => lowered(alias, column).like(format!("{}%", pattern(s))),
        Test::EndsWith(s) => lowered(alias, column).like(format!("%{}", pattern(s))),
        Test::GreaterThan(v) => field.gt(value(v)),
        Test::LessThan(v) => field.lt(value(v)),
        Test::AtLeast(v) => field.gte(value(v)),
        Test::AtMost(v) => field.lte(value(v)),
        Test::Between(low, high) => field.between(value(low), value(high)),
    }
}

/// `LOWER(alias.column)` for case-insensitive matching.
fn lowered(alias: &str, column: &str) -> SimpleExpr {
    Func::lower(Expr::col((Alias::new(alias), Alias::new(column)))).into()
}

fn pattern(text: &str) -> String {
    escape_like_wildcards(&text.to_lowercase())
}

fn value(operand: &Operand) -> sea_query::Value {
    match operand {
        Operand::Date(d) => (*d).into(),
        Operand::Integer(i) => (*i).into(),
        Operand::Decimal(d) => (*d).into(),
        Operand::Text(s) => s.clone().into(),
        Operand::Id(id) => (*id).into(),
    }
}

/// Wire names of every projectable report field.
pub fn field_names() -> impl Iterator<Item = &'static str> {
    std::iter::once("id").chain(ReportField::ALL.iter().map(ReportField::name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::report::filter::FilterModel;
    use crate::report::predicate::compile;
    use serde_json::json;

    fn sql_for(filters: serde_json::Value) -> (String, String) {
        let predicate = compile(&FilterModel::from_value(filters).unwrap()).unwrap();
        let builder = ReportQueryBuilder::new(&predicate);
        let pagination = Pagination::resolve(Some(2), Some(10), 10_000).unwrap();
        (builder.build(pagination), builder.build_count())
    }

    #[test]
    fn joins_every_reference_table() {
        let (select, count) = sql_for(json!({}));

        assert!(select.contains("FROM \"producao\" AS \"p\""), "{select}");
        for join in [
            "LEFT JOIN \"cbo\" AS \"c\" ON \"p\".\"cbo_id\" = \"c\".\"id\"",
            "LEFT JOIN \"prestador\" AS \"pr\" ON \"p\".\"prestador_id\" = \"pr\".\"id\"",
            "LEFT JOIN \"procedimento\" AS \"pc\" ON \"p\".\"procedimento_id\" = \"pc\".\"id\"",
            "LEFT JOIN \"srub\" AS \"s\" ON \"p\".\"srub_id\" = \"s\".\"id\"",
        ] {
            assert!(select.contains(join), "{select}");
            assert!(count.contains(join), "{count}");
        }
        assert!(!select.contains("WHERE"));
    }

    #[test]
    fn orders_and_paginates() {
        let (select, count) = sql_for(json!({}));

        assert!(
            select.contains(
                "ORDER BY \"p\".\"competence\" DESC, \"p\".\"created_at\" DESC, \"p\".\"id\" ASC"
            ),
            "{select}"
        );
        assert!(select.contains("LIMIT 10"));
        assert!(select.contains("OFFSET 10"));
        assert!(count.contains("COUNT(*)"));
        assert!(!count.contains("LIMIT"));
        assert!(!count.contains("ORDER BY"));
    }

    #[test]
    fn selects_nested_columns_under_aliases() {
        let (select, _) = sql_for(json!({}));
        assert!(select.contains("\"pr\".\"code\" AS \"prestador_code\""), "{select}");
        assert!(select.contains("\"pc\".\"value\" AS \"procedimento_value\""), "{select}");
        assert!(select.contains("\"s\".\"financing_type\" AS \"srub_financing_type\""), "{select}");
    }

    #[test]
    fn legacy_range_is_inclusive() {
        let (select, count) = sql_for(json!({"dateFrom": "2024-01-01", "dateTo": "2024-01-31"}));
        assert!(select.contains("\"p\".\"competence\" >= '2024-01-01'"), "{select}");
        assert!(select.contains("\"p\".\"competence\" <= '2024-01-31'"), "{select}");
        assert!(count.contains("\"p\".\"competence\" >= '2024-01-01'"), "{count}");
    }

    #[test]
    fn or_groups_follow_the_tree() {
        let (select, _) = sql_for(json!([
            {"field": "prdCid", "operator": "equals", "value": "A"},
            {"field": "prdCid", "operator": "equals", "value": "B", "logicalOperator": "OR"},
            {"field": "prdQtd", "operator": "greaterThan", "value": 1}
        ]));
        assert!(
            select.contains("(\"p\".\"diagnosis_code\" = 'A' OR \"p\".\"diagnosis_code\" = 'B')"),
            "{select}"
        );
        assert!(select.contains("AND \"p\".\"quantity\" > 1"), "{select}");
    }

    #[test]
    fn text_matching_is_case_insensitive() {
        let (select, _) = sql_for(json!([
            {"field": "prestador.razaoSocial", "operator": "contains", "value": "Hospital"},
            {"field": "procedimento.codigo", "operator": "startsWith", "value": "03"}
        ]));
        assert!(select.contains("LOWER(\"pr\".\"legal_name\") LIKE '%hospital%'"), "{select}");
        assert!(select.contains("LOWER(\"pc\".\"code\") LIKE '03%'"), "{select}");
    }

    #[test]
    fn like_wildcards_escaped() {
        let (select, _) = sql_for(json!([
            {"field": "prdCid", "operator": "endsWith", "value": "100%_done"}
        ]));
        assert!(
            select.contains("100\\\\%\\\\_done") || select.contains("100\\%\\_done"),
            "LIKE wildcards should be escaped: {select}"
        );
        assert!(!select.contains("'%100%_done'"), "{select}");
    }

    #[test]
    fn between_and_id_equality() {
        let (select, _) = sql_for(json!([
            {"field": "prdVlP", "operator": "between", "value": ["10", "20.5"]},
            {"field": "prestador", "operator": "equals", "value": "0192f0a0-0000-7000-8000-000000000001"}
        ]));
        assert!(select.contains("\"p\".\"value\" BETWEEN 10 AND 20.5"), "{select}");
        assert!(
            select.contains("\"p\".\"prestador_id\" = '0192f0a0-0000-7000-8000-000000000001'"),
            "{select}"
        );
    }

    #[test]
    fn quotes_in_values_are_escaped() {
        let (select, _) = sql_for(json!([
            {"field": "prdCid", "operator": "equals", "value": "x'; DROP TABLE producao; --"}
        ]));
        assert!(!select.contains("'x';"), "{select}");
    }

    #[test]
    fn field_names_include_id() {
        let names: Vec<_> = field_names().collect();
        assert_eq!(names[0], "id");
        assert!(names.contains(&"procedimento.valor"));
        assert_eq!(names.len(), ReportField::ALL.len() + 1);
    }
}
