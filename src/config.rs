use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

/// Conventional environment variables for the target Nightscout site.
pub const SITE_ENV_VAR: &str = "NIGHTSCOUT_SITE";
pub const API_SECRET_ENV_VAR: &str = "NIGHTSCOUT_API_SECRET";
pub const DEVICE_ENV_VAR: &str = "NIGHTSCOUT_DEVICE";

/// Typed configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingSite(&'static str),
    #[error("sync.gap_minutes must be positive, got {0}")]
    GapDuration(i64),
    #[error("sync.edge_margin_secs must not be negative, got {0}")]
    EdgeMargin(i64),
    #[error("sync.lookback_hours must be positive, got {0}")]
    Lookback(i64),
    #[error("a lookback of {0} hours is out of range")]
    LookbackRange(i64),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub nightscout: NightscoutConfig,
    pub source: SourceConfig,
    pub network: NetworkConfig,
    pub sync: SyncConfig,
}

/// The site gaps are searched in and recovered entries are uploaded to.
#[derive(Debug, Deserialize, Clone)]
pub struct NightscoutConfig {
    pub url: String,
    pub api_secret: String,
    /// Device name recorded on uploaded entries that carry none.
    pub device: String,
}

/// The site recovered entries are read from (e.g. xDrip's local web service).
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub url: String,
    pub api_secret: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:17580".to_string(),
            api_secret: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Shortest spacing between readings that counts as a gap
    pub gap_minutes: i64,
    /// Entries this close to a gap boundary are not recovered
    pub edge_margin_secs: i64,
    /// How far back gap searches look by default
    pub lookback_hours: i64,
    /// Log uploads instead of sending them
    pub no_upload: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gap_minutes: 7,
            edge_margin_secs: 30,
            lookback_hours: 24,
            no_upload: false,
        }
    }
}

impl SyncConfig {
    pub fn min_gap(&self) -> Duration {
        Duration::minutes(self.gap_minutes)
    }

    pub fn edge_margin(&self) -> Duration {
        Duration::seconds(self.edge_margin_secs)
    }

    pub fn lookback(&self) -> Duration {
        Duration::hours(self.lookback_hours)
    }

    /// Start of a window of `hours` (or `lookback_hours`) ending at `now`.
    pub fn window_start(
        &self,
        now: DateTime<Utc>,
        hours: Option<i64>,
    ) -> Result<DateTime<Utc>, ConfigError> {
        let hours = hours.unwrap_or(self.lookback_hours);
        if hours <= 0 {
            return Err(ConfigError::Lookback(hours));
        }
        Duration::try_hours(hours)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or(ConfigError::LookbackRange(hours))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gap_minutes <= 0 {
            return Err(ConfigError::GapDuration(self.gap_minutes));
        }
        if self.edge_margin_secs < 0 {
            return Err(ConfigError::EdgeMargin(self.edge_margin_secs));
        }
        if self.lookback_hours <= 0 {
            return Err(ConfigError::Lookback(self.lookback_hours));
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glucose-sync");

        let builder = Config::builder()
            // 1. Defaults, seeded from the conventional Nightscout variables
            .set_default("nightscout.url", env_or_empty(SITE_ENV_VAR))?
            .set_default("nightscout.api_secret", env_or_empty(API_SECRET_ENV_VAR))?
            .set_default("nightscout.device", default_device())?
            .set_default("source.url", SourceConfig::default().url)?
            .set_default("source.api_secret", "")?
            .set_default("network.request_timeout_secs", 30)?
            .set_default("network.connect_timeout_secs", 10)?
            .set_default("sync.gap_minutes", 7)?
            .set_default("sync.edge_margin_secs", 30)?
            .set_default("sync.lookback_hours", 24)?
            .set_default("sync.no_upload", false)?
            // 2. Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // 3. User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // 4. Environment variables (GSYNC__SYNC__GAP_MINUTES=...)
            .add_source(Environment::with_prefix("GSYNC").separator("__"));

        let config: AppConfig = builder
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sync.validate()
    }

    /// The target site URL, or an error naming the variable to set.
    pub fn site_url(&self) -> Result<&str, ConfigError> {
        if self.nightscout.url.is_empty() {
            return Err(ConfigError::MissingSite(SITE_ENV_VAR));
        }
        Ok(&self.nightscout.url)
    }
}

fn env_or_empty(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

/// `NIGHTSCOUT_DEVICE`, or `openaps://<host>` when unset.
fn default_device() -> String {
    match std::env::var(DEVICE_ENV_VAR) {
        Ok(device) if !device.is_empty() => device,
        _ => host_device(gethostname::gethostname().to_str()),
    }
}

/// Device name for a host; `unknown` when the host name is unavailable.
fn host_device(host: Option<&str>) -> String {
    let host = host.filter(|h| !h.is_empty()).unwrap_or("unknown");
    format!("openaps://{}", host)
}
