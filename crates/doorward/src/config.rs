//! Daemon configuration
//!
//! Parsed from a YAML file into `Raw*` structs with serde defaults, then
//! resolved into runtime config. Secrets can come from the environment
//! instead of the file.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::env;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Raw daemon configuration (parsed from YAML)
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    /// Path of the redb file backing the local credential cache
    pub cache_path: PathBuf,

    /// Remote record store
    pub store: RawStoreConfig,

    /// Hardware reader bridge
    pub reader: RawReaderConfig,

    /// Outbound notification webhooks
    #[serde(default)]
    pub webhook: RawWebhookConfig,

    /// Full cache resync interval in seconds (default: 3600)
    #[serde(default = "defaults::resync_interval_seconds")]
    pub resync_interval_seconds: u64,

    /// Grace window after expiry in hours (default: 72)
    #[serde(default = "defaults::leniency_hours")]
    pub leniency_hours: u64,
}

/// Remote record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RawStoreConfig {
    /// Base URL of the record store API
    pub url: String,

    /// Service token sent as X-Service-Token (or DOORWARD_SERVICE_TOKEN)
    #[serde(default)]
    pub service_token: Option<String>,

    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "defaults::store_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Hardware reader bridge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RawReaderConfig {
    /// host:port of the reader bridge
    pub addr: String,

    /// Reconnect delay after link loss in seconds (default: 5)
    #[serde(default = "defaults::retry_delay_seconds")]
    pub retry_delay_seconds: u64,
}

/// Webhook configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWebhookConfig {
    /// General channel webhook (or DOORWARD_WEBHOOK_URL)
    #[serde(default)]
    pub url: Option<String>,

    /// Admin escalation channel webhook
    #[serde(default)]
    pub escalation_url: Option<String>,
}

mod defaults {
    pub fn resync_interval_seconds() -> u64 {
        3600
    }
    pub fn leniency_hours() -> u64 {
        72
    }
    pub fn store_timeout_seconds() -> u64 {
        10
    }
    pub fn retry_delay_seconds() -> u64 {
        5
    }
}

/// Resolved daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_path: PathBuf,
    pub store: StoreConfig,
    pub reader: ReaderConfig,
    pub webhook: WebhookConfig,
    pub resync_interval: Duration,
    pub leniency: Duration,
}

/// Resolved record store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub service_token: Option<String>,
    pub timeout: Duration,
}

/// Resolved reader configuration
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub addr: String,
    pub retry_delay: Duration,
}

/// Resolved webhook configuration
#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub escalation_url: Option<String>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawConfig =
            serde_yaml::from_str(yaml).context("failed to parse config YAML")?;

        let mut config = Config::from(raw);

        // Secrets may come from the environment instead of the file
        if let Some(token) = env_nonempty("DOORWARD_SERVICE_TOKEN") {
            config.store.service_token = Some(token);
        }
        if let Some(url) = env_nonempty("DOORWARD_WEBHOOK_URL") {
            config.webhook.url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.store.url.is_empty() {
            anyhow::bail!("store.url must not be empty");
        }
        if !self.store.url.starts_with("http://") && !self.store.url.starts_with("https://") {
            anyhow::bail!("store.url must be an http(s) URL: {}", self.store.url);
        }
        if self.reader.addr.is_empty() {
            anyhow::bail!("reader.addr must not be empty");
        }
        Ok(())
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            cache_path: raw.cache_path,
            store: StoreConfig {
                // Trailing slash would double up when joining paths
                url: raw.store.url.trim_end_matches('/').to_string(),
                service_token: raw.store.service_token,
                timeout: Duration::from_secs(raw.store.timeout_seconds),
            },
            reader: ReaderConfig {
                addr: raw.reader.addr,
                retry_delay: Duration::from_secs(raw.reader.retry_delay_seconds),
            },
            webhook: WebhookConfig {
                url: raw.webhook.url,
                escalation_url: raw.webhook.escalation_url,
            },
            resync_interval: Duration::from_secs(raw.resync_interval_seconds),
            leniency: Duration::from_secs(raw.leniency_hours * 3600),
        }
    }
}
