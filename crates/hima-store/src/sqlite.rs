//! SQLite-based store implementation

use hima_api::{NotificationSettings, UserIdentity};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{Store, StoreError, StoreResult, NOTIFICATION_SETTINGS_KEY, USER_KEY};

/// SQLite-based store. Values are JSON documents in a single key/value table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row("SELECT value_json FROM kv WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(value)?;
        let updated_at = hima_util::format_instant(&hima_util::now_utc());

        conn.execute(
            r#"
            INSERT INTO kv (key, value_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at
            "#,
            params![key, json, updated_at],
        )?;

        debug!(key, "Value saved");
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn get_user(&self) -> StoreResult<Option<UserIdentity>> {
        self.get_json(USER_KEY)
    }

    fn set_user(&self, user: &UserIdentity) -> StoreResult<()> {
        self.put_json(USER_KEY, user)
    }

    fn clear_user(&self) -> StoreResult<()> {
        self.delete(USER_KEY)
    }

    fn get_notification_settings(&self) -> StoreResult<Option<NotificationSettings>> {
        self.get_json(NOTIFICATION_SETTINGS_KEY)
    }

    fn set_notification_settings(&self, settings: &NotificationSettings) -> StoreResult<()> {
        self.put_json(NOTIFICATION_SETTINGS_KEY, settings)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hima_util::GroupId;

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_user_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get_user().unwrap().is_none());

        let user = UserIdentity::register("taro").unwrap();
        store.set_user(&user).unwrap();
        assert_eq!(store.get_user().unwrap(), Some(user.clone()));

        let renamed = UserIdentity {
            nickname: "jiro".into(),
            ..user
        };
        store.set_user(&renamed).unwrap();
        assert_eq!(store.get_user().unwrap().unwrap().nickname, "jiro");

        store.clear_user().unwrap();
        assert!(store.get_user().unwrap().is_none());
    }

    #[test]
    fn test_notification_settings_default_and_save() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get_notification_settings().unwrap().is_none());
        assert_eq!(store.notification_settings(), NotificationSettings::default());

        let mut settings = NotificationSettings::default();
        settings.set_group(GroupId::new("g"), false);
        store.set_notification_settings(&settings).unwrap();

        assert_eq!(store.notification_settings(), settings);
    }

    #[test]
    fn test_corrupt_settings_fall_back_to_default() {
        let store = SqliteStore::in_memory().unwrap();
        store.put_json(NOTIFICATION_SETTINGS_KEY, &"garbage").unwrap();

        assert!(store.get_notification_settings().is_err());
        assert_eq!(store.notification_settings(), NotificationSettings::default());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hima.db");
        let user = UserIdentity::register("hanako").unwrap();

        SqliteStore::open(&path).unwrap().set_user(&user).unwrap();

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get_user().unwrap(), Some(user));
    }
}
