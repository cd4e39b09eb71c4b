use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use meli_tools::MeliConfig;
use msr_common::Secret;

const DEFAULT_MSR_HOST: &str = "127.0.0.1";
const DEFAULT_MSR_PORT: u16 = 8480;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/relay_ledger.db";
const DEFAULT_ALLOWED_TOPICS: &str = "orders_v2";
const DEFAULT_FORWARD_TIMEOUT_SECS: u64 = 15;
const DEFAULT_FORWARD_MAX_RETRIES: u32 = 3;
const DEFAULT_FORWARD_BACKOFF_MS: u64 = 800;
const DEFAULT_DELIVERY_RETENTION_DAYS: i64 = 30;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Topics the relay will act on. Notifications for any other topic are acknowledged and ignored.
    pub allowed_topics: Vec<String>,
    /// When set, inbound webhook bodies must carry a valid HMAC-SHA256 signature over the raw body.
    pub webhook_secret: Option<Secret<String>>,
    /// Enables the fulfilled/delivered/invoice-authorized business-rule vetoes.
    pub semantic_blocks: bool,
    /// Escape hatch: when true, a semantic block does not suppress a genuinely new status transition.
    pub forward_through_blocks: bool,
    /// When set, suppresses forwarding for notifications whose `sent` timestamp predates the order's first forward
    /// by more than this window.
    pub late_duplicate_window: Option<Duration>,
    /// How long raw delivery fingerprints are kept before the retention sweep removes them.
    pub delivery_retention: Duration,
    pub forward: ForwardConfig,
    pub meli: MeliConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MSR_HOST.to_string(),
            port: DEFAULT_MSR_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            allowed_topics: vec![DEFAULT_ALLOWED_TOPICS.to_string()],
            webhook_secret: None,
            semantic_blocks: true,
            forward_through_blocks: false,
            late_duplicate_window: None,
            delivery_retention: Duration::days(DEFAULT_DELIVERY_RETENTION_DAYS),
            forward: ForwardConfig::default(),
            meli: MeliConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MSR_HOST").ok().unwrap_or_else(|| DEFAULT_MSR_HOST.into());
        let port = env::var("MSR_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MSR_PORT. {e} Using the default, {DEFAULT_MSR_PORT}, instead."
                    );
                    DEFAULT_MSR_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MSR_PORT);
        let database_url = env::var("MSR_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MSR_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}, instead.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let allowed_topics = env::var("MSR_ALLOWED_TOPICS")
            .unwrap_or_else(|_| DEFAULT_ALLOWED_TOPICS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        let webhook_secret = match env::var("MSR_WEBHOOK_SECRET") {
            Ok(s) if !s.is_empty() => Some(Secret::new(s)),
            _ => {
                info!("🪛️ MSR_WEBHOOK_SECRET is not set. Webhook signatures will not be checked.");
                None
            },
        };
        let semantic_blocks = env::var("MSR_SEMANTIC_BLOCKS").map(|s| &s != "0" && &s != "false").unwrap_or(true);
        let forward_through_blocks =
            env::var("MSR_FORWARD_THROUGH_BLOCKS").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let late_duplicate_window = env::var("MSR_LATE_DUPLICATE_WINDOW")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for MSR_LATE_DUPLICATE_WINDOW. {e}"))
                    .ok()
            })
            .map(Duration::seconds);
        let delivery_retention = env::var("MSR_DELIVERY_RETENTION_DAYS")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for MSR_DELIVERY_RETENTION_DAYS. {e}"))
                    .ok()
            })
            .map(Duration::days)
            .unwrap_or_else(|| Duration::days(DEFAULT_DELIVERY_RETENTION_DAYS));
        let forward = ForwardConfig::from_env_or_default();
        let meli = MeliConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            allowed_topics,
            webhook_secret,
            semantic_blocks,
            forward_through_blocks,
            late_duplicate_window,
            delivery_retention,
            forward,
            meli,
        }
    }
}

//-------------------------------------------------  ForwardConfig  ---------------------------------------------------

#[derive(Clone, Debug)]
pub struct ForwardConfig {
    /// The downstream automation endpoint. When unset, the relay still runs the full pipeline but every forward
    /// fails with a logged error.
    pub sink_url: Option<String>,
    pub timeout: StdDuration,
    pub max_retries: u32,
    /// First retry delay; doubles on each subsequent transport failure.
    pub backoff_base: StdDuration,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            sink_url: None,
            timeout: StdDuration::from_secs(DEFAULT_FORWARD_TIMEOUT_SECS),
            max_retries: DEFAULT_FORWARD_MAX_RETRIES,
            backoff_base: StdDuration::from_millis(DEFAULT_FORWARD_BACKOFF_MS),
        }
    }
}

impl ForwardConfig {
    pub fn from_env_or_default() -> Self {
        let sink_url = match env::var("MSR_SINK_URL") {
            Ok(s) if !s.is_empty() => Some(s),
            _ => {
                error!("🪛️ MSR_SINK_URL is not set. Sale events cannot be forwarded downstream.");
                None
            },
        };
        let timeout = env::var("MSR_FORWARD_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(StdDuration::from_secs)
            .unwrap_or_else(|| StdDuration::from_secs(DEFAULT_FORWARD_TIMEOUT_SECS));
        let max_retries = env::var("MSR_FORWARD_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_FORWARD_MAX_RETRIES);
        let backoff_base = env::var("MSR_FORWARD_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(StdDuration::from_millis)
            .unwrap_or_else(|| StdDuration::from_millis(DEFAULT_FORWARD_BACKOFF_MS));
        Self { sink_url, timeout, max_retries, backoff_base }
    }
}

//-------------------------------------------------  PipelineOptions  -------------------------------------------------

/// The subset of the server configuration the webhook pipeline needs at request time. Generally we try to keep this
/// as small as possible, and exclude the credential set to avoid passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub allowed_topics: Vec<String>,
    pub webhook_secret: Option<Secret<String>>,
    pub semantic_blocks: bool,
    pub forward_through_blocks: bool,
    pub late_duplicate_window: Option<Duration>,
}

impl PipelineOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            allowed_topics: config.allowed_topics.clone(),
            webhook_secret: config.webhook_secret.clone(),
            semantic_blocks: config.semantic_blocks,
            forward_through_blocks: config.forward_through_blocks,
            late_duplicate_window: config.late_duplicate_window,
        }
    }

    pub fn topic_allowed(&self, topic: &str) -> bool {
        self.allowed_topics.iter().any(|t| t == topic)
    }
}
