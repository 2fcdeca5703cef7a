use crate::errors::AppError;
use std::time::Duration;

/// A geocoded coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

// Bounding box approximating Mexico; results outside it are treated as
// geocoder mismatches and rejected.
pub const BOUNDS_LAT_MIN: f64 = 14.3;
pub const BOUNDS_LAT_MAX: f64 = 33.0;
pub const BOUNDS_LON_MIN: f64 = -118.6;
pub const BOUNDS_LON_MAX: f64 = -86.4;

/// Whether a coordinate pair falls inside the configured country box.
pub fn in_country_bounds(coords: Coordinates) -> bool {
    coords.lat >= BOUNDS_LAT_MIN
        && coords.lat <= BOUNDS_LAT_MAX
        && coords.lon >= BOUNDS_LON_MIN
        && coords.lon <= BOUNDS_LON_MAX
}

/// Client for the forward-geocoding service (Mapbox geocoding v5 wire
/// format).
#[derive(Clone)]
pub struct GeocoderClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GeocoderClient {
    /// Creates a new `GeocoderClient`.
    pub fn new(base_url: String, token: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create geocoder client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Forward-geocodes a postal address, returning the top-ranked result
    /// or `None` when the service finds nothing.
    pub async fn forward(&self, address: &str) -> Result<Option<Coordinates>, AppError> {
        let encoded: String = url::form_urlencoded::byte_serialize(address.as_bytes()).collect();
        let url = reqwest::Url::parse_with_params(
            &format!(
                "{}/geocoding/v5/mapbox.places/{}.json",
                self.base_url, encoded
            ),
            &[
                ("access_token", self.token.as_str()),
                ("limit", "1"),
                ("country", "mx"),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        // Redact token from logs to prevent credential exposure
        tracing::debug!(
            "Geocoding request: {}/geocoding/v5/mapbox.places/{}.json?access_token=[REDACTED]",
            self.base_url,
            encoded
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Geocoder request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Geocoder returned {}: {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse geocoder response: {}", e))
        })?;

        let center = body
            .get("features")
            .and_then(|f| f.as_array())
            .and_then(|f| f.first())
            .and_then(|feature| feature.get("center"))
            .and_then(|c| c.as_array());

        let Some(center) = center else {
            return Ok(None);
        };

        // Mapbox centers are [lon, lat]
        match (
            center.first().and_then(|v| v.as_f64()),
            center.get(1).and_then(|v| v.as_f64()),
        ) {
            (Some(lon), Some(lat)) => Ok(Some(Coordinates { lat, lon })),
            _ => Ok(None),
        }
    }
}
