//! Validated configuration structures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::schema::{RawAppConfig, RawBackendConfig, RawConfig, RawSyncConfig};

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_EVENTS_PER_SECOND: u32 = 10;
pub const DEFAULT_INVITE_BASE_URL: &str = "https://hima.example";

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub sync: SyncConfig,
    pub app: AppConfig,
}

impl Config {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            backend: BackendConfig::from_raw(raw.backend),
            sync: SyncConfig::from_raw(raw.sync),
            app: AppConfig::from_raw(raw.app),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project URL without a trailing slash
    pub url: String,
    pub anon_key: Option<String>,
}

impl BackendConfig {
    fn from_raw(raw: RawBackendConfig) -> Self {
        Self {
            url: raw.url.trim_end_matches('/').to_string(),
            anon_key: raw.anon_key,
        }
    }
}

/// How a reconciliation sweep treats its downgrade writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteThroughMode {
    /// Spawn the writes and return immediately
    #[default]
    FireAndForget,
    /// Wait for the writes before the refresh completes. Failures are still
    /// only logged.
    Await,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Periodic sweep interval. None means refresh only on demand or change.
    pub refresh_interval: Option<Duration>,
    pub poll_interval: Duration,
    pub events_per_second: u32,
    pub write_through: WriteThroughMode,
}

impl SyncConfig {
    fn from_raw(raw: RawSyncConfig) -> Self {
        let refresh_interval = match raw
            .refresh_interval_seconds
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS)
        {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            refresh_interval,
            poll_interval: Duration::from_secs(
                raw.poll_interval_seconds.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            events_per_second: raw.events_per_second.unwrap_or(DEFAULT_EVENTS_PER_SECOND),
            write_through: raw.write_through.unwrap_or_default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_raw(RawSyncConfig::default())
    }
}

/// Display language for labels and durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Ja,
    En,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ja" | "ja-jp" => Ok(Locale::Ja),
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            other => Err(format!("Unknown locale: {}", other)),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::Ja => f.write_str("ja"),
            Locale::En => f.write_str("en"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub locale: Locale,
    pub invite_base_url: String,
    /// None means the platform default data directory
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    fn from_raw(raw: RawAppConfig) -> Self {
        Self {
            locale: raw
                .parsed_locale()
                .and_then(Result::ok)
                .unwrap_or_default(),
            invite_base_url: raw
                .invite_base_url
                .unwrap_or_else(|| DEFAULT_INVITE_BASE_URL.to_string()),
            data_dir: raw.data_dir,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_raw(RawAppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_parsing() {
        assert_eq!("ja".parse::<Locale>().unwrap(), Locale::Ja);
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn sync_defaults() {
        let sync = SyncConfig::default();
        assert_eq!(sync.refresh_interval, Some(Duration::from_secs(60)));
        assert_eq!(sync.poll_interval, Duration::from_secs(5));
        assert_eq!(sync.events_per_second, 10);
        assert_eq!(sync.write_through, WriteThroughMode::FireAndForget);
    }
}
