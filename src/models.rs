use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============ Database Models ============

/// One physical retail location, scoped to the owning account.
///
/// A store is created on first sighting of its `suc_sap` code and never
/// deleted by the ingestion pipeline; re-uploads refresh `last_seen` and
/// the address fields.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Store {
    /// Unique identifier for the store.
    pub id: Uuid,
    /// Owning account; row-level access is enforced by the storage layer.
    pub owner_id: Uuid,
    /// External store code, unique per account.
    pub suc_sap: String,
    /// Display name.
    pub sucursal: String,
    /// Brand / format label.
    pub format: String,
    /// Sales zone.
    pub zona: Option<String>,
    /// District.
    pub distrito: Option<String>,
    /// State.
    pub estado: Option<String>,
    /// Municipality.
    pub municipio: Option<String>,
    /// City.
    pub ciudad: Option<String>,
    /// Street address.
    pub calle: Option<String>,
    /// Neighborhood.
    pub colonia: Option<String>,
    /// Postal code.
    pub cp: Option<String>,
    /// Latitude, null until geocoded.
    pub lat: Option<f64>,
    /// Longitude, null until geocoded.
    pub lon: Option<f64>,
    /// First upload date the store appeared in.
    pub first_seen: NaiveDate,
    /// Most recent upload date the store appeared in.
    pub last_seen: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============ Ingestion API Types ============

/// Client-side parsed CSV: the header row plus every data row as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvPayload {
    pub headers: Vec<String>,
    #[serde(rename = "full_data", alias = "fullData")]
    pub full_data: Vec<Vec<String>>,
}

/// Body of the upload endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    #[serde(rename = "csv_data", alias = "csvData")]
    pub csv_data: CsvPayload,
    pub filename: String,
    /// Format the client believes it detected; the server re-detects and
    /// this field is informational only.
    #[serde(rename = "detected_format", alias = "detectedFormat", default)]
    pub detected_format: Option<String>,
}

/// Aggregate counts for one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAnalytics {
    pub stores_processed: usize,
    pub new_stores: usize,
    pub existing_stores: usize,
    pub metrics_imported: usize,
    pub period_month: String,
    /// Closure detection is an unimplemented gap; always 0.
    pub closed_stores: usize,
}

/// Response of the upload endpoints. `errors` holds at most the first 10
/// entries; `total_errors` is the full count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub analytics: UploadAnalytics,
    pub errors: Vec<String>,
    pub total_errors: usize,
    pub performance_ms: u128,
}

// ============ Geocoding API Types ============

/// Batch-sizing mode for a geocoding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeMode {
    /// Process everything outstanding when the pending count is small,
    /// else fall back to fixed-size batches.
    Smart,
    /// Process every store lacking coordinates in one run.
    All,
    /// Process up to `batch_size` stores.
    Batch,
}

/// Body of the geocode endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeRequest {
    #[serde(default = "default_geocode_mode")]
    pub mode: GeocodeMode,
    #[serde(rename = "batch_size", alias = "batchSize", default)]
    pub batch_size: Option<usize>,
    #[serde(rename = "dry_run", alias = "dryRun", default)]
    pub dry_run: bool,
}

fn default_geocode_mode() -> GeocodeMode {
    GeocodeMode::Smart
}

/// Outcome of geocoding one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreGeocodeResult {
    pub store_id: Uuid,
    pub suc_sap: String,
    pub success: bool,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub error: Option<String>,
}

/// Response of the geocode endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeResponse {
    pub dry_run: bool,
    pub mode: GeocodeMode,
    /// Stores lacking coordinates before this run.
    pub total_pending: usize,
    /// Stores selected for this run.
    pub selected: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Stores still lacking coordinates after this run.
    pub remaining: usize,
    /// Set when the selected batch did not cover all pending stores.
    pub recommend_rerun: bool,
    pub results: Vec<StoreGeocodeResult>,
    /// Dry-run only: sample of composed addresses.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sample_addresses: Vec<String>,
    pub performance_ms: u128,
}

// ============ Read API Types ============

/// Query parameters of the stores read endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoresQuery {
    /// Metric family: "growth" (default) or "absolute".
    pub format: Option<String>,
    pub estado: Option<String>,
    /// Store format label filter (brand), distinct from the metric family.
    pub formato: Option<String>,
    pub zona: Option<String>,
    pub distrito: Option<String>,
    /// Historical period to pin; defaults to the latest available.
    pub period: Option<NaiveDate>,
}

/// Store joined with its metric for the selected period. Growth values
/// here are already converted to percentage units for display. Metric
/// columns default to null when the other family's table was joined.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StoreWithMetrics {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub store: Store,
    #[sqlx(default)]
    pub year_comparison: Option<String>,
    #[sqlx(default)]
    pub revenue_growth_pct: Option<f64>,
    #[sqlx(default)]
    pub orders_growth_pct: Option<f64>,
    #[sqlx(default)]
    pub ticket_growth_pct: Option<f64>,
    #[sqlx(default)]
    pub ventas: Option<f64>,
    #[sqlx(default)]
    pub ordenes: Option<i64>,
    #[sqlx(default)]
    pub tickets: Option<i64>,
}

/// One selectable historical period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodInfo {
    pub period: NaiveDate,
    /// Human-readable label, e.g. "2026-08-25".
    pub label: String,
}

/// Response of the stores read endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoresResponse {
    pub stores: Vec<StoreWithMetrics>,
    pub available_periods: Vec<PeriodInfo>,
    pub selected_period: Option<NaiveDate>,
    pub total: usize,
}
