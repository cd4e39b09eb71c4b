use std::time::Duration;

use log::*;
use msr_common::Secret;

const DEFAULT_API_URL: &str = "https://api.mercadolibre.com";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct MeliConfig {
    /// Base URL of the marketplace API, without a trailing slash.
    pub api_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub refresh_token: Secret<String>,
    /// Timeout applied to every outbound call, including the token refresh.
    pub timeout: Duration,
}

impl Default for MeliConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            client_id: String::default(),
            client_secret: Secret::default(),
            refresh_token: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl MeliConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MSR_ML_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let client_id = std::env::var("MSR_ML_CLIENT_ID").unwrap_or_else(|_| {
            warn!("MSR_ML_CLIENT_ID is not set. API calls that need credentials will fail.");
            String::default()
        });
        let client_secret = Secret::new(std::env::var("MSR_ML_CLIENT_SECRET").unwrap_or_else(|_| {
            warn!("MSR_ML_CLIENT_SECRET is not set. API calls that need credentials will fail.");
            String::default()
        }));
        let refresh_token = Secret::new(std::env::var("MSR_ML_REFRESH_TOKEN").unwrap_or_else(|_| {
            warn!("MSR_ML_REFRESH_TOKEN is not set. API calls that need credentials will fail.");
            String::default()
        }));
        let timeout = std::env::var("MSR_ML_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self { api_url, client_id, client_secret, refresh_token, timeout }
    }

    /// True when all three credential values required for a token refresh are present.
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.reveal().is_empty() && !self.refresh_token.reveal().is_empty()
    }
}
