use crate::errors::{AppError, ResultExt};
use crate::geocoding::{in_country_bounds, GeocoderClient};
use crate::models::{GeocodeMode, GeocodeRequest, GeocodeResponse, StoreGeocodeResult};
use crate::rate_limit::Pacer;
use sqlx::{FromRow, PgPool};
use std::time::Instant;
use uuid::Uuid;

/// Smart mode processes everything outstanding up to this many stores;
/// above it, it falls back to fixed-size batches.
pub const SMART_MODE_THRESHOLD: usize = 600;

/// External-call rate ceiling, per the geocoding service's free tier.
pub const GEOCODER_CALLS_PER_SECOND: u32 = 10;

/// How many composed addresses a dry run returns as a sample.
const DRY_RUN_SAMPLE: usize = 5;

/// A store selected for geocoding: identity plus its address fields.
#[derive(Debug, Clone, FromRow)]
pub struct PendingStore {
    pub id: Uuid,
    pub suc_sap: String,
    pub calle: Option<String>,
    pub colonia: Option<String>,
    pub ciudad: Option<String>,
    pub municipio: Option<String>,
    pub estado: Option<String>,
    pub cp: Option<String>,
}

/// Composes the postal address sent to the geocoder: non-empty fields in
/// fixed order, closed by the country literal. Municipality is included
/// only when it differs from the city. Empty when the store has no
/// address data at all.
pub fn compose_address(store: &PendingStore) -> String {
    fn push<'a>(field: &'a Option<String>, parts: &mut Vec<&'a str>) {
        if let Some(value) = field.as_deref() {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }

    let mut parts: Vec<&str> = Vec::new();
    push(&store.calle, &mut parts);
    push(&store.colonia, &mut parts);
    push(&store.ciudad, &mut parts);
    if store.municipio.as_deref().map(str::trim) != store.ciudad.as_deref().map(str::trim) {
        push(&store.municipio, &mut parts);
    }
    push(&store.estado, &mut parts);
    push(&store.cp, &mut parts);

    if parts.is_empty() {
        return String::new();
    }
    parts.push("Mexico");
    parts.join(", ")
}

/// How many of the pending stores a run selects, given the requested mode.
pub fn select_count(
    mode: GeocodeMode,
    pending: usize,
    batch_size: Option<usize>,
    default_batch_size: usize,
) -> usize {
    let batch = batch_size.unwrap_or(default_batch_size).max(1);
    match mode {
        GeocodeMode::All => pending,
        GeocodeMode::Batch => batch.min(pending),
        GeocodeMode::Smart => {
            if pending <= SMART_MODE_THRESHOLD {
                pending
            } else {
                batch.min(pending)
            }
        }
    }
}

/// Runs one geocoding batch over an account's stores lacking coordinates.
///
/// Calls are strictly sequential behind the pacer; each success is written
/// individually so a crash mid-run leaves partial progress durably
/// applied, and the next run's selection naturally skips geocoded stores.
pub struct GeocodeRunner {
    pool: PgPool,
    client: GeocoderClient,
    default_batch_size: usize,
}

impl GeocodeRunner {
    pub fn new(pool: PgPool, client: GeocoderClient, default_batch_size: usize) -> Self {
        Self {
            pool,
            client,
            default_batch_size,
        }
    }

    pub async fn run(
        &self,
        owner_id: Uuid,
        request: &GeocodeRequest,
    ) -> Result<GeocodeResponse, AppError> {
        let started = Instant::now();

        let pending: Vec<PendingStore> = sqlx::query_as(
            "SELECT id, suc_sap, calle, colonia, ciudad, municipio, estado, cp \
             FROM stores WHERE owner_id = $1 AND (lat IS NULL OR lon IS NULL) \
             ORDER BY created_at",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to select stores pending geocoding")?;

        let total_pending = pending.len();
        let selected = select_count(
            request.mode,
            total_pending,
            request.batch_size,
            self.default_batch_size,
        );
        let batch = &pending[..selected];

        tracing::info!(
            "Geocoding run ({:?}): {} pending, {} selected, dry_run={}",
            request.mode,
            total_pending,
            selected,
            request.dry_run
        );

        if request.dry_run {
            // Selection and address-building only: no calls, no writes
            let sample_addresses = batch
                .iter()
                .take(DRY_RUN_SAMPLE)
                .map(compose_address)
                .collect();
            return Ok(GeocodeResponse {
                dry_run: true,
                mode: request.mode,
                total_pending,
                selected,
                succeeded: 0,
                failed: 0,
                remaining: total_pending,
                recommend_rerun: selected < total_pending,
                results: Vec::new(),
                sample_addresses,
                performance_ms: started.elapsed().as_millis(),
            });
        }

        let mut pacer = Pacer::new(GEOCODER_CALLS_PER_SECOND);
        let mut results = Vec::with_capacity(selected);
        let mut succeeded = 0usize;

        for store in batch {
            let result = self.geocode_one(store, &mut pacer).await?;
            if result.success {
                succeeded += 1;
            }
            results.push(result);
        }

        let failed = selected - succeeded;
        let remaining = total_pending - succeeded;

        tracing::info!(
            "Geocoding run complete: {} succeeded, {} failed, {} remaining",
            succeeded,
            failed,
            remaining
        );

        Ok(GeocodeResponse {
            dry_run: false,
            mode: request.mode,
            total_pending,
            selected,
            succeeded,
            failed,
            remaining,
            recommend_rerun: selected < total_pending,
            results,
            sample_addresses: Vec::new(),
            performance_ms: started.elapsed().as_millis(),
        })
    }

    /// Geocodes one store. Geocoder failures and out-of-bounds results are
    /// recorded on the store's result and never abort the batch; only a
    /// database write failure is fatal.
    async fn geocode_one(
        &self,
        store: &PendingStore,
        pacer: &mut Pacer,
    ) -> Result<StoreGeocodeResult, AppError> {
        let mut result = StoreGeocodeResult {
            store_id: store.id,
            suc_sap: store.suc_sap.clone(),
            success: false,
            lat: None,
            lon: None,
            error: None,
        };

        let address = compose_address(store);
        if address.is_empty() {
            result.error = Some("no address data".to_string());
            return Ok(result);
        }

        pacer.acquire().await;

        let coords = match self.client.forward(&address).await {
            Ok(Some(coords)) => coords,
            Ok(None) => {
                result.error = Some("no geocoding result".to_string());
                return Ok(result);
            }
            Err(e) => {
                tracing::error!("Geocoding failed for store {}: {}", store.suc_sap, e);
                result.error = Some(e.to_string());
                return Ok(result);
            }
        };

        if !in_country_bounds(coords) {
            result.error = Some(format!(
                "result outside country bounds ({:.4}, {:.4})",
                coords.lat, coords.lon
            ));
            return Ok(result);
        }

        sqlx::query("UPDATE stores SET lat = $2, lon = $3, updated_at = NOW() WHERE id = $1")
            .bind(store.id)
            .bind(coords.lat)
            .bind(coords.lon)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to store coordinates for '{}'", store.suc_sap))?;

        result.success = true;
        result.lat = Some(coords.lat);
        result.lon = Some(coords.lon);
        Ok(result)
    }
}
