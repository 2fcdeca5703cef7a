use serde::Deserialize;

/// Runtime configuration, loaded once at startup from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Base URL of the hosted auth provider that issued the bearer tokens.
    pub auth_base_url: String,
    /// Service key sent alongside token validation requests.
    pub auth_api_key: String,
    /// Base URL of the forward-geocoding service.
    pub geocoder_base_url: String,
    pub geocoder_token: String,
    /// Default batch size for geocoding runs when the client omits one.
    pub geocode_batch_size: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            auth_base_url: std::env::var("AUTH_BASE_URL")
                .map_err(|_| anyhow::anyhow!("AUTH_BASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("AUTH_BASE_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("AUTH_BASE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })?,
            auth_api_key: std::env::var("AUTH_API_KEY")
                .map_err(|_| anyhow::anyhow!("AUTH_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("AUTH_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            geocoder_base_url: std::env::var("GEOCODER_BASE_URL")
                .unwrap_or_else(|_| "https://api.mapbox.com".to_string()),
            geocoder_token: std::env::var("GEOCODER_TOKEN")
                .or_else(|_| std::env::var("MAPBOX_TOKEN"))
                .map_err(|_| {
                    anyhow::anyhow!("GEOCODER_TOKEN or MAPBOX_TOKEN environment variable required")
                })
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("GEOCODER_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            geocode_batch_size: std::env::var("GEOCODE_BATCH_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GEOCODE_BATCH_SIZE must be a positive number"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Auth Base URL: {}", config.auth_base_url);
        tracing::debug!("Geocoder Base URL: {}", config.geocoder_base_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
