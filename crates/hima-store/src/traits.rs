//! Store trait definitions

use hima_api::{NotificationSettings, UserIdentity};
use tracing::warn;

use crate::StoreResult;

/// Storage key for the registered user
pub const USER_KEY: &str = "hima_app_user";

/// Storage key for notification settings
pub const NOTIFICATION_SETTINGS_KEY: &str = "hima_notification_settings";

/// Main store trait
pub trait Store: Send + Sync {
    // User identity

    /// Load the registered user, if any
    fn get_user(&self) -> StoreResult<Option<UserIdentity>>;

    /// Save the registered user, replacing any previous one
    fn set_user(&self, user: &UserIdentity) -> StoreResult<()>;

    /// Forget the registered user
    fn clear_user(&self) -> StoreResult<()>;

    // Notification settings

    /// Load saved notification settings
    fn get_notification_settings(&self) -> StoreResult<Option<NotificationSettings>>;

    /// Save notification settings
    fn set_notification_settings(&self, settings: &NotificationSettings) -> StoreResult<()>;

    /// Saved settings, or the defaults when none are saved or they can't be read
    fn notification_settings(&self) -> NotificationSettings {
        match self.get_notification_settings() {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to load notification settings, using defaults");
                NotificationSettings::default()
            }
        }
    }

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
