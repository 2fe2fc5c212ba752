//! Default locations for the config file and local data
//!
//! Both follow the XDG base directories, falling back to `~/.config` and
//! `~/.local/share`, and finally to `/tmp/hima` when `HOME` is unset.

use std::path::PathBuf;

/// Environment variable for overriding the data directory
pub const HIMA_DATA_DIR_ENV: &str = "HIMA_DATA_DIR";

const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "hima";

/// `$<xdg_var>/hima`, else `$HOME/<home_fallback>/hima`
fn xdg_app_dir(xdg_var: &str, home_fallback: &[&str]) -> Option<PathBuf> {
    if let Ok(base) = std::env::var(xdg_var) {
        return Some(PathBuf::from(base).join(APP_DIR));
    }

    let mut path = PathBuf::from(std::env::var("HOME").ok()?);
    path.extend(home_fallback);
    Some(path.join(APP_DIR))
}

/// `$XDG_CONFIG_HOME/hima/config.toml` or `~/.config/hima/config.toml`.
///
/// `HIMA_CONFIG` is handled by the CLI argument parser.
pub fn default_config_path() -> PathBuf {
    xdg_app_dir("XDG_CONFIG_HOME", &[".config"])
        .unwrap_or_else(|| PathBuf::from("/tmp").join(APP_DIR))
        .join(CONFIG_FILENAME)
}

/// `$HIMA_DATA_DIR`, else `$XDG_DATA_HOME/hima` or `~/.local/share/hima`
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(HIMA_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    xdg_app_dir("XDG_DATA_HOME", &[".local", "share"])
        .unwrap_or_else(|| PathBuf::from("/tmp").join(APP_DIR).join("data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_ends_with_config_toml() {
        let path = default_config_path();
        assert!(path.ends_with("hima/config.toml"));
    }

    #[test]
    fn xdg_dir_ends_with_app_dir() {
        if let Some(path) = xdg_app_dir("XDG_DATA_HOME", &[".local", "share"]) {
            assert!(path.ends_with(APP_DIR));
        }
    }
}
