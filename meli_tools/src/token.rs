use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::*;
use reqwest::Client;
use tokio::sync::Mutex;

use crate::{config::MeliConfig, data_objects::TokenResponse, error::MeliApiError};

// Refresh this long before the provider's stated expiry, so a token never goes stale mid-request.
const EXPIRY_SKEW_SECS: i64 = 30;
// Fallback lifetime when the provider omits expires_in.
const DEFAULT_LIFETIME_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct CachedToken {
    access: String,
    expires_at: DateTime<Utc>,
}

/// A single-flight cache for the marketplace access token.
///
/// The `(token, expiry)` pair lives behind one async mutex, and the refresh happens while the lock is held. A caller
/// that arrives during an in-flight refresh therefore waits for that refresh and reuses its result rather than
/// triggering its own, and the pair is always replaced as an atomic unit.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    inner: Arc<Mutex<Option<CachedToken>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached access token, refreshing it first if it is missing or within [`EXPIRY_SKEW_SECS`] of
    /// expiry. Fails hard when credentials are missing or the provider answers with a non-success status.
    pub async fn access_token(&self, client: &Client, config: &MeliConfig) -> Result<String, MeliApiError> {
        let mut guard = self.inner.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Utc::now() < cached.expires_at - Duration::seconds(EXPIRY_SKEW_SECS) {
                return Ok(cached.access.clone());
            }
        }
        if !config.has_credentials() {
            return Err(MeliApiError::Credential(
                "MSR_ML_CLIENT_ID, MSR_ML_CLIENT_SECRET and MSR_ML_REFRESH_TOKEN must all be set".to_string(),
            ));
        }
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.reveal().as_str()),
            ("refresh_token", config.refresh_token.reveal().as_str()),
        ];
        let response = client
            .post(format!("{}/oauth/token", config.api_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| MeliApiError::Credential(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(MeliApiError::Credential(format!("Token endpoint returned {status}. {message}")));
        }
        let token: TokenResponse = response.json().await.map_err(|e| MeliApiError::JsonError(e.to_string()))?;
        let lifetime = token.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS);
        let expires_at = Utc::now() + Duration::seconds(lifetime);
        info!("🔁 Access token refreshed. Valid until {expires_at}");
        *guard = Some(CachedToken { access: token.access_token.clone(), expires_at });
        Ok(token.access_token)
    }
}
