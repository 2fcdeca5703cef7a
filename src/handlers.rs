use crate::auth::{AuthClient, AuthedAccount};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::geocode_runner::GeocodeRunner;
use crate::geocoding::GeocoderClient;
use crate::ingestion::IngestionService;
use crate::models::*;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use moka::future::Cache;
use serde_json::json;
use sqlx::{PgPool, QueryBuilder, Row};
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Client for the external geocoding service.
    pub geocoder: GeocoderClient,
    /// Client for the hosted auth provider.
    pub auth: AuthClient,
    /// Validated bearer token -> account id cache (short TTL).
    pub token_cache: Cache<String, Uuid>,
}

/// Health check endpoint.
///
/// Unauthenticated liveness probe; bypasses the rate limiter.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "retail-map-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/uploads/growth
///
/// Ingests a growth-format CSV export for the authenticated account.
pub async fn upload_growth(
    State(state): State<Arc<AppState>>,
    account: AuthedAccount,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    tracing::info!(
        "POST /uploads/growth - file: {}, rows: {}",
        payload.filename,
        payload.csv_data.full_data.len()
    );

    let service = IngestionService::new(state.db.clone());
    let response = service.run_growth(account.owner_id, &payload).await?;

    tracing::info!(
        "Growth upload complete: {} stores ({} new), {} metrics, {} errors",
        response.analytics.stores_processed,
        response.analytics.new_stores,
        response.analytics.metrics_imported,
        response.total_errors
    );

    Ok(Json(response))
}

/// POST /api/v1/uploads/absolute
///
/// Ingests an absolute-format CSV export for the authenticated account.
pub async fn upload_absolute(
    State(state): State<Arc<AppState>>,
    account: AuthedAccount,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    tracing::info!(
        "POST /uploads/absolute - file: {}, rows: {}",
        payload.filename,
        payload.csv_data.full_data.len()
    );

    let service = IngestionService::new(state.db.clone());
    let response = service.run_absolute(account.owner_id, &payload).await?;

    tracing::info!(
        "Absolute upload complete: {} stores ({} new), {} metrics, {} errors",
        response.analytics.stores_processed,
        response.analytics.new_stores,
        response.analytics.metrics_imported,
        response.total_errors
    );

    Ok(Json(response))
}

/// POST /api/v1/geocode
///
/// Runs a geocoding batch over the account's stores lacking coordinates.
pub async fn geocode_stores(
    State(state): State<Arc<AppState>>,
    account: AuthedAccount,
    Json(payload): Json<GeocodeRequest>,
) -> Result<Json<GeocodeResponse>, AppError> {
    tracing::info!(
        "POST /geocode - mode: {:?}, dry_run: {}",
        payload.mode,
        payload.dry_run
    );

    let runner = GeocodeRunner::new(
        state.db.clone(),
        state.geocoder.clone(),
        state.config.geocode_batch_size,
    );
    let response = runner.run(account.owner_id, &payload).await?;

    Ok(Json(response))
}

/// GET /api/v1/stores
///
/// Returns the account's stores joined with their metric for the selected
/// period, plus the list of available historical periods. The decimal to
/// percentage conversion for growth values happens here, at the read
/// boundary, and nowhere else.
pub async fn list_stores(
    State(state): State<Arc<AppState>>,
    account: AuthedAccount,
    Query(query): Query<StoresQuery>,
) -> Result<Json<StoresResponse>, AppError> {
    let family = query.format.as_deref().unwrap_or("growth");
    let growth = match family {
        "growth" => true,
        "absolute" => false,
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown metric format '{}', expected growth or absolute",
                other
            )))
        }
    };

    let metric_table = if growth {
        "growth_metrics"
    } else {
        "absolute_metrics"
    };
    let periods: Vec<chrono::NaiveDate> = sqlx::query(&format!(
        "SELECT DISTINCT period FROM {} WHERE owner_id = $1 ORDER BY period DESC",
        metric_table
    ))
    .bind(account.owner_id)
    .fetch_all(&state.db)
    .await
    .context("Failed to list available periods")?
    .into_iter()
    .map(|row| row.get("period"))
    .collect();

    let selected_period = query.period.or_else(|| periods.first().copied());

    let mut builder: QueryBuilder<sqlx::Postgres> = if growth {
        QueryBuilder::new(
            "SELECT DISTINCT ON (s.id) s.*, m.year_comparison, m.revenue_growth_pct, \
             m.orders_growth_pct, m.ticket_growth_pct \
             FROM stores s LEFT JOIN growth_metrics m ON m.store_id = s.id AND m.period = ",
        )
    } else {
        QueryBuilder::new(
            "SELECT DISTINCT ON (s.id) s.*, m.ventas, m.ordenes, m.tickets \
             FROM stores s LEFT JOIN absolute_metrics m ON m.store_id = s.id AND m.period = ",
        )
    };
    builder.push_bind(selected_period);
    builder.push(" WHERE s.owner_id = ");
    builder.push_bind(account.owner_id);
    if let Some(ref estado) = query.estado {
        builder.push(" AND s.estado = ").push_bind(estado);
    }
    if let Some(ref formato) = query.formato {
        builder.push(" AND s.format = ").push_bind(formato);
    }
    if let Some(ref zona) = query.zona {
        builder.push(" AND s.zona = ").push_bind(zona);
    }
    if let Some(ref distrito) = query.distrito {
        builder.push(" AND s.distrito = ").push_bind(distrito);
    }
    builder.push(" ORDER BY s.id, m.updated_at DESC NULLS LAST");

    let mut stores: Vec<StoreWithMetrics> = builder
        .build_query_as()
        .fetch_all(&state.db)
        .await
        .context("Failed to query stores")?;

    // Stored decimal fractions become display percentages only here
    for store in &mut stores {
        store.revenue_growth_pct = store.revenue_growth_pct.map(|v| v * 100.0);
        store.orders_growth_pct = store.orders_growth_pct.map(|v| v * 100.0);
        store.ticket_growth_pct = store.ticket_growth_pct.map(|v| v * 100.0);
    }

    let total = stores.len();
    Ok(Json(StoresResponse {
        stores,
        available_periods: periods
            .into_iter()
            .map(|p| PeriodInfo {
                period: p,
                label: p.format("%Y-%m-%d").to_string(),
            })
            .collect(),
        selected_period,
        total,
    }))
}
