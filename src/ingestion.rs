use crate::csv_format::{detect_format, FormatType};
use crate::errors::{AppError, ResultExt};
use crate::metric_writer::MetricWriter;
use crate::models::{UploadAnalytics, UploadRequest, UploadResponse};
use crate::normalizer::{
    normalize_absolute_rows, normalize_growth_rows, resolve_columns, NormalizedBatch,
};
use crate::reconciler::StoreReconciler;
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use sqlx::{PgPool, Row};
use std::sync::OnceLock;
use std::time::Instant;
use uuid::Uuid;

/// Error lists in responses are capped at this many entries; the total
/// count is always reported.
pub const MAX_REPORTED_ERRORS: usize = 10;

fn year_comparison_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(20\d{2})\s*vs\.?\s*(20\d{2})").unwrap())
}

/// Extracts the year-comparison label from the matched growth headers,
/// e.g. "Crec% Ventas 2025 vs 2024" yields "2025 vs 2024". Falls back to
/// a label derived from the upload date when no header carries one.
pub fn extract_year_comparison(headers: &[String], period: NaiveDate) -> String {
    for header in headers {
        if let Some(caps) = year_comparison_regex().captures(header) {
            return format!("{} vs {}", &caps[1], &caps[2]);
        }
    }
    format!("{} vs {}", period.year(), period.year() - 1)
}

/// Orchestrates one ingestion run: detect, normalize, audit, reconcile,
/// upsert metrics, finalize the audit record.
pub struct IngestionService {
    pool: PgPool,
}

impl IngestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs a growth-format ingestion for `owner_id`.
    pub async fn run_growth(
        &self,
        owner_id: Uuid,
        request: &UploadRequest,
    ) -> Result<UploadResponse, AppError> {
        let started = Instant::now();
        let period = Utc::now().date_naive();

        self.check_detection(&request.csv_data.headers, FormatType::Growth)?;
        let map = resolve_columns(&request.csv_data.headers, true)?;
        let batch = normalize_growth_rows(&request.csv_data.full_data, &map);
        let year_comparison = extract_year_comparison(&map.kpi_headers, period);

        let upload_id = self
            .begin_upload(owner_id, &request.filename, "growth", period)
            .await?;

        let reconciler = StoreReconciler::new(self.pool.clone());
        let outcome = reconciler.reconcile(owner_id, &batch.stores, period).await?;

        let writer = MetricWriter::new(self.pool.clone());
        let write = writer
            .write_growth(
                owner_id,
                &batch.metrics,
                &outcome.id_by_code,
                period,
                &year_comparison,
            )
            .await?;

        let mut errors = batch.errors;
        errors.extend(write.errors);

        self.finalize_upload(
            upload_id,
            outcome.new_stores,
            outcome.existing_stores,
            write.metrics_written,
            errors.len(),
        )
        .await?;

        Ok(build_response(
            batch.stores.len(),
            outcome.new_stores,
            outcome.existing_stores,
            write.metrics_written,
            period,
            errors,
            started,
        ))
    }

    /// Runs an absolute-format ingestion for `owner_id`.
    pub async fn run_absolute(
        &self,
        owner_id: Uuid,
        request: &UploadRequest,
    ) -> Result<UploadResponse, AppError> {
        let started = Instant::now();
        let period = Utc::now().date_naive();

        self.check_detection(&request.csv_data.headers, FormatType::Absolute)?;
        let map = resolve_columns(&request.csv_data.headers, false)?;
        let batch: NormalizedBatch<_> = normalize_absolute_rows(&request.csv_data.full_data, &map);

        let upload_id = self
            .begin_upload(owner_id, &request.filename, "absolute", period)
            .await?;

        let reconciler = StoreReconciler::new(self.pool.clone());
        let outcome = reconciler.reconcile(owner_id, &batch.stores, period).await?;

        let writer = MetricWriter::new(self.pool.clone());
        let write = writer
            .write_absolute(owner_id, &batch.metrics, &outcome.id_by_code, period)
            .await?;

        let mut errors = batch.errors;
        errors.extend(write.errors);

        self.finalize_upload(
            upload_id,
            outcome.new_stores,
            outcome.existing_stores,
            write.metrics_written,
            errors.len(),
        )
        .await?;

        Ok(build_response(
            batch.stores.len(),
            outcome.new_stores,
            outcome.existing_stores,
            write.metrics_written,
            period,
            errors,
            started,
        ))
    }

    /// Rejects files whose headers do not classify as the endpoint's
    /// format. Unknown detection reports the matched columns so the file
    /// can be diagnosed.
    fn check_detection(&self, headers: &[String], expected: FormatType) -> Result<(), AppError> {
        let detection = detect_format(headers);
        if detection.format_type == expected {
            return Ok(());
        }
        Err(AppError::BadRequest(format!(
            "CSV format detected as '{}' (confidence {:.2}, matched columns: [{}]), expected '{}'",
            detection.format_type.as_str(),
            detection.confidence,
            detection.matched_columns.join(", "),
            expected.as_str()
        )))
    }

    /// Inserts the audit record at ingestion start.
    async fn begin_upload(
        &self,
        owner_id: Uuid,
        filename: &str,
        format_type: &str,
        period: NaiveDate,
    ) -> Result<Uuid, AppError> {
        let row = sqlx::query(
            "INSERT INTO upload_history (owner_id, filename, format_type, period_month) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(owner_id)
        .bind(filename)
        .bind(format_type)
        .bind(period.format("%Y-%m").to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to record upload start")?;
        Ok(row.get("id"))
    }

    /// Patches the audit record with final counts; immutable afterwards.
    async fn finalize_upload(
        &self,
        upload_id: Uuid,
        new_stores: usize,
        existing_stores: usize,
        metrics_imported: usize,
        error_count: usize,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE upload_history SET new_stores = $2, existing_stores = $3, \
             metrics_imported = $4, error_count = $5, finalized_at = NOW() \
             WHERE id = $1 AND finalized_at IS NULL",
        )
        .bind(upload_id)
        .bind(new_stores as i32)
        .bind(existing_stores as i32)
        .bind(metrics_imported as i32)
        .bind(error_count as i32)
        .execute(&self.pool)
        .await
        .context("Failed to finalize upload record")?;
        Ok(())
    }
}

fn build_response(
    stores_processed: usize,
    new_stores: usize,
    existing_stores: usize,
    metrics_imported: usize,
    period: NaiveDate,
    errors: Vec<String>,
    started: Instant,
) -> UploadResponse {
    let total_errors = errors.len();
    UploadResponse {
        success: true,
        analytics: UploadAnalytics {
            stores_processed,
            new_stores,
            existing_stores,
            metrics_imported,
            period_month: period.format("%Y-%m").to_string(),
            // TODO: detect stores absent from the latest upload as closed
            closed_stores: 0,
        },
        errors: errors.into_iter().take(MAX_REPORTED_ERRORS).collect(),
        total_errors,
        performance_ms: started.elapsed().as_millis(),
    }
}
