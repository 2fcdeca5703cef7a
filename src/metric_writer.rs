use crate::errors::{AppError, ResultExt};
use crate::normalizer::{AbsoluteValues, GrowthValues};
use chrono::NaiveDate;
use sqlx::{PgPool, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

/// Result of one bulk metric upsert.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub metrics_written: usize,
    /// Rows dropped because their store id could not be resolved.
    pub errors: Vec<String>,
}

/// Associates normalized metric rows with resolved store ids and performs
/// one bulk upsert keyed on the metric table's natural uniqueness, making
/// a same-day re-upload an idempotent overwrite.
pub struct MetricWriter {
    pool: PgPool,
}

impl MetricWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts growth metrics keyed on (store_id, period, year_comparison).
    pub async fn write_growth(
        &self,
        owner_id: Uuid,
        metrics: &[(String, GrowthValues)],
        id_by_code: &HashMap<String, Uuid>,
        period: NaiveDate,
        year_comparison: &str,
    ) -> Result<WriteOutcome, AppError> {
        let mut outcome = WriteOutcome::default();
        let resolved = resolve(metrics, id_by_code, &mut outcome);
        if resolved.is_empty() {
            return Ok(outcome);
        }

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO growth_metrics (owner_id, store_id, period, year_comparison, \
             revenue_growth_pct, orders_growth_pct, ticket_growth_pct) ",
        );
        builder.push_values(&resolved, |mut b, (store_id, values)| {
            b.push_bind(owner_id)
                .push_bind(store_id)
                .push_bind(period)
                .push_bind(year_comparison)
                .push_bind(values.revenue_growth_pct)
                .push_bind(values.orders_growth_pct)
                .push_bind(values.ticket_growth_pct);
        });
        builder.push(
            " ON CONFLICT (store_id, period, year_comparison) DO UPDATE SET \
             revenue_growth_pct = EXCLUDED.revenue_growth_pct, \
             orders_growth_pct = EXCLUDED.orders_growth_pct, \
             ticket_growth_pct = EXCLUDED.ticket_growth_pct, \
             updated_at = NOW()",
        );

        builder
            .build()
            .execute(&self.pool)
            .await
            .context("Bulk growth metric upsert failed")?;

        outcome.metrics_written = resolved.len();
        tracing::info!(
            "Wrote {} growth metrics for period {} ({})",
            outcome.metrics_written,
            period,
            year_comparison
        );
        Ok(outcome)
    }

    /// Upserts absolute metrics keyed on (store_id, period).
    pub async fn write_absolute(
        &self,
        owner_id: Uuid,
        metrics: &[(String, AbsoluteValues)],
        id_by_code: &HashMap<String, Uuid>,
        period: NaiveDate,
    ) -> Result<WriteOutcome, AppError> {
        let mut outcome = WriteOutcome::default();
        let resolved = resolve(metrics, id_by_code, &mut outcome);
        if resolved.is_empty() {
            return Ok(outcome);
        }

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO absolute_metrics (owner_id, store_id, period, ventas, ordenes, tickets) ",
        );
        builder.push_values(&resolved, |mut b, (store_id, values)| {
            b.push_bind(owner_id)
                .push_bind(store_id)
                .push_bind(period)
                .push_bind(values.ventas)
                .push_bind(values.ordenes)
                .push_bind(values.tickets);
        });
        builder.push(
            " ON CONFLICT (store_id, period) DO UPDATE SET \
             ventas = EXCLUDED.ventas, \
             ordenes = EXCLUDED.ordenes, \
             tickets = EXCLUDED.tickets, \
             updated_at = NOW()",
        );

        builder
            .build()
            .execute(&self.pool)
            .await
            .context("Bulk absolute metric upsert failed")?;

        outcome.metrics_written = resolved.len();
        tracing::info!(
            "Wrote {} absolute metrics for period {}",
            outcome.metrics_written,
            period
        );
        Ok(outcome)
    }
}

/// Drops metric rows whose store code has no resolved id; recorded as
/// errors, never fatal.
fn resolve<'a, M: Clone>(
    metrics: &'a [(String, M)],
    id_by_code: &HashMap<String, Uuid>,
    outcome: &mut WriteOutcome,
) -> Vec<(Uuid, &'a M)> {
    let mut resolved = Vec::with_capacity(metrics.len());
    for (code, values) in metrics {
        match id_by_code.get(code) {
            Some(id) => resolved.push((*id, values)),
            None => {
                tracing::error!("No store id resolved for code '{}', metric dropped", code);
                outcome
                    .errors
                    .push(format!("No store id resolved for code '{}'", code));
            }
        }
    }
    resolved
}
