use crate::errors::AppError;
use crate::handlers::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Client validating externally-issued bearer tokens against the hosted
/// auth provider.
#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create auth client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Validates a bearer token, returning the account id it belongs to.
    ///
    /// An invalid or expired token maps to `Unauthorized`; provider
    /// outages surface as external-API errors instead of silently
    /// rejecting valid users.
    pub async fn validate_token(&self, token: &str) -> Result<Uuid, AppError> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Auth provider request failed: {}", e))
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AppError::Unauthorized("Invalid bearer token".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApiError(format!(
                "Auth provider returned {}",
                status
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse auth response: {}", e))
        })?;

        body.get("id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                AppError::ExternalApiError("Auth response missing user id".to_string())
            })
    }
}

/// The authenticated account an endpoint operates on behalf of.
///
/// Extraction fails with 401 before any request processing when the
/// bearer token is missing or invalid. Validated tokens are cached with a
/// short TTL to avoid one auth-provider round-trip per request.
#[derive(Debug, Clone, Copy)]
pub struct AuthedAccount {
    pub owner_id: Uuid,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthedAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        if let Some(owner_id) = state.token_cache.get(token).await {
            return Ok(AuthedAccount { owner_id });
        }

        let owner_id = state.auth.validate_token(token).await?;
        state.token_cache.insert(token.to_string(), owner_id).await;

        Ok(AuthedAccount { owner_id })
    }
}
