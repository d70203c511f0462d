//! Dashboard statistics.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppResult;

/// Summary figures for the landing dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub providers: i64,
    pub active_providers: i64,
    pub procedures: i64,
    pub occupations: i64,
    pub financing_sources: i64,
    pub production_records: i64,
    pub total_quantity: i64,
    pub total_value: Decimal,
    pub latest_competence: Option<NaiveDate>,
    /// Providers with a record in the latest competence, as a percentage of
    /// active providers.
    pub occupancy_rate: Decimal,
}

#[derive(sqlx::FromRow)]
struct Counts {
    providers: i64,
    active_providers: i64,
    procedures: i64,
    occupations: i64,
    financing_sources: i64,
    production_records: i64,
    total_quantity: i64,
    total_value: Decimal,
    latest_competence: Option<NaiveDate>,
    producing_providers: i64,
}

/// Compute dashboard statistics in one round trip.
pub async fn stats(pool: &PgPool) -> AppResult<DashboardStats> {
    let counts = sqlx::query_as::<_, Counts>(
        r#"
        WITH latest AS (SELECT MAX(competence) AS competence FROM producao)
        SELECT
            (SELECT COUNT(*) FROM prestador) AS providers,
            (SELECT COUNT(*) FROM prestador WHERE active) AS active_providers,
            (SELECT COUNT(*) FROM procedimento) AS procedures,
            (SELECT COUNT(*) FROM cbo) AS occupations,
            (SELECT COUNT(*) FROM srub) AS financing_sources,
            (SELECT COUNT(*) FROM producao) AS production_records,
            (SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM producao) AS total_quantity,
            (SELECT COALESCE(SUM(value), 0) FROM producao) AS total_value,
            (SELECT competence FROM latest) AS latest_competence,
            (SELECT COUNT(DISTINCT p.prestador_id)
               FROM producao p
               JOIN prestador pr ON pr.id = p.prestador_id AND pr.active
              WHERE p.competence = (SELECT competence FROM latest)) AS producing_providers
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        occupancy_rate: occupancy_rate(counts.producing_providers, counts.active_providers),
        providers: counts.providers,
        active_providers: counts.active_providers,
        procedures: counts.procedures,
        occupations: counts.occupations,
        financing_sources: counts.financing_sources,
        production_records: counts.production_records,
        total_quantity: counts.total_quantity,
        total_value: counts.total_value,
        latest_competence: counts.latest_competence,
    })
}

/// Percentage rounded to two places; zero when there is nothing to divide by.
pub fn occupancy_rate(producing: i64, active: i64) -> Decimal {
    if active <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(producing) * Decimal::ONE_HUNDRED / Decimal::from(active)).round_dp(2)
}
