//! Backup export and import
//!
//! A backup is a pretty-printed JSON file holding the registered user and the
//! notification settings. Either section may be null; import restores only
//! the sections present.

use chrono::{DateTime, Utc};
use hima_api::{NotificationSettings, UserIdentity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::{Store, StoreError, StoreResult};

/// Format version written into every backup
pub const BACKUP_VERSION: &str = "1.0.0";

/// On-disk backup document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(default)]
    pub user_data: Option<UserIdentity>,
    #[serde(default)]
    pub notification_settings: Option<NotificationSettings>,
    pub exported_at: String,
    pub version: String,
}

/// What an import restored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub user_restored: bool,
    pub settings_restored: bool,
}

/// `hima_backup_YYYY-MM-DD.json`, dated in UTC
pub fn backup_file_name(now: DateTime<Utc>) -> String {
    format!("hima_backup_{}.json", now.format("%Y-%m-%d"))
}

/// Snapshot the store into a backup document
pub fn create_backup(store: &dyn Store, now: DateTime<Utc>) -> StoreResult<Backup> {
    Ok(Backup {
        user_data: store.get_user()?,
        notification_settings: store.get_notification_settings()?,
        exported_at: hima_util::format_instant(&now),
        version: BACKUP_VERSION.to_string(),
    })
}

/// Write a backup file into `dir` and return its path
pub fn export_backup(store: &dyn Store, dir: &Path, now: DateTime<Utc>) -> StoreResult<PathBuf> {
    let backup = create_backup(store, now)?;
    std::fs::create_dir_all(dir)?;

    let path = dir.join(backup_file_name(now));
    std::fs::write(&path, serde_json::to_string_pretty(&backup)?)?;

    info!(path = %path.display(), "Backup exported");
    Ok(path)
}

/// Restore the sections present in a backup file
pub fn import_backup(store: &dyn Store, path: &Path) -> StoreResult<ImportSummary> {
    let content = std::fs::read_to_string(path)?;
    let backup: Backup =
        serde_json::from_str(&content).map_err(|e| StoreError::InvalidBackup(e.to_string()))?;

    let mut summary = ImportSummary::default();

    if let Some(user) = &backup.user_data {
        store.set_user(user)?;
        summary.user_restored = true;
    }

    if let Some(settings) = &backup.notification_settings {
        store.set_notification_settings(settings)?;
        summary.settings_restored = true;
    }

    info!(
        path = %path.display(),
        version = %backup.version,
        user_restored = summary.user_restored,
        settings_restored = summary.settings_restored,
        "Backup imported"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteStore;
    use chrono::TimeZone;
    use hima_util::GroupId;

    fn export_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }

    #[test]
    fn test_backup_file_name() {
        assert_eq!(backup_file_name(export_time()), "hima_backup_2024-05-06.json");
    }

    #[test]
    fn test_export_then_import_into_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let source = SqliteStore::in_memory().unwrap();
        let user = UserIdentity::register("taro").unwrap();
        let mut settings = NotificationSettings::default();
        settings.set_group(GroupId::new("g"), false);
        source.set_user(&user).unwrap();
        source.set_notification_settings(&settings).unwrap();

        let path = export_backup(&source, dir.path(), export_time()).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["version"], "1.0.0");
        assert_eq!(written["exportedAt"], "2024-05-06T07:08:09.000Z");
        assert_eq!(written["userData"]["nickname"], "taro");

        let target = SqliteStore::in_memory().unwrap();
        let summary = import_backup(&target, &path).unwrap();
        assert!(summary.user_restored && summary.settings_restored);
        assert_eq!(target.get_user().unwrap(), Some(user));
        assert_eq!(target.notification_settings(), settings);
    }

    #[test]
    fn test_import_skips_null_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(
            &path,
            r#"{"userData": null, "notificationSettings": {"enabled": false, "groupSettings": {}}, "exportedAt": "2024-01-01T00:00:00.000Z", "version": "1.0.0"}"#,
        )
        .unwrap();

        let store = SqliteStore::in_memory().unwrap();
        let existing = UserIdentity::register("keep-me").unwrap();
        store.set_user(&existing).unwrap();

        let summary = import_backup(&store, &path).unwrap();
        assert!(!summary.user_restored);
        assert!(summary.settings_restored);
        assert_eq!(store.get_user().unwrap(), Some(existing));
        assert!(!store.notification_settings().enabled);
    }

    #[test]
    fn test_import_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = SqliteStore::in_memory().unwrap();
        let result = import_backup(&store, &path);
        assert!(matches!(result, Err(StoreError::InvalidBackup(_))));
    }
}
