//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{Locale, WriteThroughMode};

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Hosted backend connection
    pub backend: RawBackendConfig,

    /// Refresh and persistence behavior
    #[serde(default)]
    pub sync: RawSyncConfig,

    /// Presentation settings
    #[serde(default)]
    pub app: RawAppConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawBackendConfig {
    /// Project URL, e.g. `https://project.supabase.co`
    pub url: String,

    /// Public (anon) API key. May instead come from `HIMA_ANON_KEY`.
    pub anon_key: Option<String>,
}

/// Sync settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSyncConfig {
    /// Periodic expiration sweep in seconds (default 60, 0 disables)
    pub refresh_interval_seconds: Option<u64>,

    /// How often the polling change feed checks the backend (default 5)
    pub poll_interval_seconds: Option<u64>,

    /// Maximum change-triggered refreshes per second (default 10)
    pub events_per_second: Option<u32>,

    /// Whether reconciliation waits for its downgrade writes
    pub write_through: Option<WriteThroughMode>,
}

/// Presentation settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAppConfig {
    /// Display language: "ja" (default) or "en"
    pub locale: Option<String>,

    /// Base URL used to build invite links
    pub invite_base_url: Option<String>,

    /// Local data directory (identity, notification settings, backups)
    pub data_dir: Option<PathBuf>,
}

impl RawAppConfig {
    pub(crate) fn parsed_locale(&self) -> Option<Result<Locale, String>> {
        self.locale.as_deref().map(str::parse)
    }
}
