//! # Engine Configuration
//!
//! Configuration for the store connection, the live ticker and reports.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TABLETIME_API_URL=https://pos.local/api                            │
//! │     TABLETIME_TICK_MS=1000                                             │
//! │     TABLETIME_PAGE_SIZE=100                                            │
//! │     TABLETIME_UTC_OFFSET_MINUTES=240                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tabletime/engine.toml (Linux)                            │
//! │     ~/Library/Application Support/com.tabletime.tabletime/engine.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     local API, 1s ticks, pages of 100, host UTC offset                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [store]
//! base_url = "https://localhost:7199/api"
//! request_timeout_secs = 15
//!
//! [ticker]
//! interval_ms = 1000
//!
//! [report]
//! page_size = 100
//! history_page_size = 10
//! utc_offset_minutes = 240
//! ```

use chrono::{Local, Offset};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use tabletime_core::period::MAX_UTC_OFFSET_MINUTES;
use tabletime_core::validation::MAX_PAGE_SIZE;
use tabletime_core::{BusinessCalendar, HISTORY_PAGE_SIZE, REPORT_PAGE_SIZE};
use tabletime_store::HttpStoreConfig;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Store Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// API root of the remote record store.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://localhost:7199/api".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Ticker Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerSettings {
    /// Refresh cadence of the live duration display.
    #[serde(default = "default_tick_ms")]
    pub interval_ms: u64,
}

fn default_tick_ms() -> u64 {
    1000
}

impl Default for TickerSettings {
    fn default() -> Self {
        TickerSettings {
            interval_ms: default_tick_ms(),
        }
    }
}

// =============================================================================
// Report Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Page size used to pull the full history.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,

    /// Business-day offset from UTC. `None` uses the host's offset.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

fn default_page_size() -> u32 {
    REPORT_PAGE_SIZE
}

fn default_history_page_size() -> u32 {
    HISTORY_PAGE_SIZE
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            page_size: default_page_size(),
            history_page_size: default_history_page_size(),
            utc_offset_minutes: None,
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub ticker: TickerSettings,

    #[serde(default)]
    pub report: ReportSettings,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> EngineResult<()> {
        let url = Url::parse(&self.store.base_url)
            .map_err(|e| EngineError::InvalidConfig(format!("base_url: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(EngineError::InvalidConfig(format!(
                "base_url must start with http:// or https://, got: {}",
                self.store.base_url
            )));
        }

        if self.ticker.interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "ticker.interval_ms must be greater than 0".into(),
            ));
        }

        for (name, size) in [
            ("report.page_size", self.report.page_size),
            ("report.history_page_size", self.report.history_page_size),
        ] {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be between 1 and {MAX_PAGE_SIZE}"
                )));
            }
        }

        if let Some(offset) = self.report.utc_offset_minutes {
            if offset.abs() > MAX_UTC_OFFSET_MINUTES {
                return Err(EngineError::InvalidConfig(format!(
                    "report.utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}"
                )));
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TABLETIME_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.store.base_url = url;
        }

        if let Ok(ms) = std::env::var("TABLETIME_TICK_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => self.ticker.interval_ms = ms,
                Err(_) => warn!(value = %ms, "Ignoring non-numeric TABLETIME_TICK_MS"),
            }
        }

        if let Ok(size) = std::env::var("TABLETIME_PAGE_SIZE") {
            match size.parse::<u32>() {
                Ok(size) => self.report.page_size = size,
                Err(_) => warn!(value = %size, "Ignoring non-numeric TABLETIME_PAGE_SIZE"),
            }
        }

        if let Ok(offset) = std::env::var("TABLETIME_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(minutes) => {
                    debug!(minutes, "Overriding UTC offset from environment");
                    self.report.utc_offset_minutes = Some(minutes);
                }
                Err(_) => warn!(value = %offset, "Ignoring non-numeric TABLETIME_UTC_OFFSET_MINUTES"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tabletime", "tabletime")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.ticker.interval_ms)
    }

    /// Calendar that decides which business day a timestamp belongs to.
    pub fn calendar(&self) -> EngineResult<BusinessCalendar> {
        match self.report.utc_offset_minutes {
            Some(minutes) => Ok(BusinessCalendar::from_offset_minutes(minutes)?),
            None => Ok(BusinessCalendar::new(Local::now().offset().fix())),
        }
    }

    pub fn http_store_config(&self) -> EngineResult<HttpStoreConfig> {
        let mut store = HttpStoreConfig::new(self.store.base_url.clone());
        store.timeout = Duration::from_secs(self.store.request_timeout_secs);
        store.naive_offset = self.calendar()?.offset();
        Ok(store)
    }
}
