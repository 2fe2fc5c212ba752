//! Record types shared by the hima crates

use chrono::{DateTime, Utc};
use hima_util::{GroupId, InviteCode, MemberId, UserId};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A member's self-reported availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Busy,
    Free,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Busy => "busy",
            Status::Free => "free",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One membership row as stored by the backend (`members` table).
///
/// `status_expires_at` is kept as the raw string the backend returned;
/// a malformed value must not stop the rest of the row from loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    pub user_id: UserId,
    pub group_id: GroupId,
    pub nickname: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub status_expires_at: Option<String>,
    #[serde(default)]
    pub status_label: Option<String>,
    /// Tomorrow plan ids in the order the member picked them
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tomorrow_plans: Vec<String>,
    #[serde(default = "default_true")]
    pub notification_enabled: bool,
    #[serde(default)]
    pub joined_at: Option<String>,
    #[serde(default)]
    pub last_active: Option<String>,
}

impl MemberRecord {
    pub fn is_free(&self) -> bool {
        self.status == Status::Free
    }

    /// Parsed expiration instant. `None` when absent or unparseable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.status_expires_at
            .as_deref()
            .and_then(hima_util::parse_instant)
    }

    /// Whether a busy record carries no leftover expiration or label
    pub fn holds_busy_invariant(&self) -> bool {
        self.status == Status::Free
            || (self.status_expires_at.is_none() && self.status_label.is_none())
    }

    /// Copy of this record with `update` applied
    pub fn with_update(&self, update: &StatusUpdate, now: DateTime<Utc>) -> Self {
        let patch = update.to_patch(now);
        Self {
            status: patch.status,
            status_expires_at: patch.status_expires_at,
            status_label: patch.status_label,
            last_active: Some(patch.last_active),
            ..self.clone()
        }
    }

    /// Copy of this record downgraded to busy, leaving `last_active` alone
    pub fn downgraded(&self) -> Self {
        Self {
            status: Status::Busy,
            status_expires_at: None,
            status_label: None,
            ..self.clone()
        }
    }
}

fn default_true() -> bool {
    true
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A status write. Busy carries nothing, so a busy row can never be
/// written with an expiration or label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Busy,
    Free {
        /// `None` means free with no end time
        expires_at: Option<DateTime<Utc>>,
        label: Option<String>,
    },
}

impl StatusUpdate {
    pub fn status(&self) -> Status {
        match self {
            StatusUpdate::Busy => Status::Busy,
            StatusUpdate::Free { .. } => Status::Free,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            StatusUpdate::Busy => None,
            StatusUpdate::Free { expires_at, .. } => *expires_at,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            StatusUpdate::Busy => None,
            StatusUpdate::Free { label, .. } => label.as_deref(),
        }
    }

    /// Column values written to the backend
    pub fn to_patch(&self, now: DateTime<Utc>) -> StatusPatch {
        StatusPatch {
            status: self.status(),
            status_expires_at: self.expires_at().as_ref().map(hima_util::format_instant),
            status_label: self.label().map(str::to_string),
            last_active: hima_util::format_instant(&now),
        }
    }
}

/// Body of a status update request. Nulls are serialized explicitly so the
/// backend clears the columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPatch {
    pub status: Status,
    pub status_expires_at: Option<String>,
    pub status_label: Option<String>,
    pub last_active: String,
}

/// Body of a tomorrow-plans update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlansPatch {
    pub tomorrow_plans: Vec<String>,
    pub last_active: String,
}

/// Insert body for a new membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub nickname: String,
    pub status: Status,
    pub tomorrow_plans: Vec<String>,
    pub notification_enabled: bool,
}

impl NewMember {
    /// A member joins as busy, with no plans and notifications on
    pub fn joining(group_id: GroupId, user_id: UserId, nickname: &str) -> Self {
        Self {
            group_id,
            user_id,
            nickname: nickname.trim().to_string(),
            status: Status::Busy,
            tomorrow_plans: Vec::new(),
            notification_enabled: true,
        }
    }
}

/// A group (`groups` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub invite_code: InviteCode,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<UserId>,
}

/// Insert body for a new group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub invite_code: InviteCode,
    pub created_by: UserId,
}

/// The locally registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub nickname: String,
}

impl UserIdentity {
    /// New identity with a fresh id. Returns `None` for a blank nickname.
    pub fn register(nickname: &str) -> Option<Self> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return None;
        }
        Some(Self {
            id: UserId::generate(),
            nickname: nickname.to_string(),
        })
    }
}

/// Per-device notification preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    #[serde(default)]
    pub group_settings: BTreeMap<GroupId, bool>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            group_settings: BTreeMap::new(),
        }
    }
}

impl NotificationSettings {
    /// Whether notifications for `group` should be shown. The global switch
    /// wins; groups without an override follow it.
    pub fn is_enabled_for(&self, group: &GroupId) -> bool {
        self.enabled && self.group_settings.get(group).copied().unwrap_or(true)
    }

    pub fn set_group(&mut self, group: GroupId, enabled: bool) {
        self.group_settings.insert(group, enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "id": "m-1",
            "user_id": "u-1",
            "group_id": "g-1",
            "nickname": "taro",
            "status": "free",
            "status_expires_at": "2024-01-01T10:00:00Z",
            "status_label": "あと2時間暇",
            "tomorrow_plans": ["night", "lunch"],
            "notification_enabled": true,
            "joined_at": "2023-12-31T09:00:00Z",
            "last_active": "2024-01-01T08:00:00Z"
        })
    }

    #[test]
    fn member_record_from_backend_json() {
        let member: MemberRecord = serde_json::from_value(sample_json()).unwrap();
        assert!(member.is_free());
        assert_eq!(member.tomorrow_plans, vec!["night", "lunch"]);
        assert_eq!(
            member.expires_at(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn null_plans_and_missing_fields_default() {
        let member: MemberRecord = serde_json::from_value(serde_json::json!({
            "id": "m-1",
            "user_id": "u-1",
            "group_id": "g-1",
            "nickname": "taro",
            "tomorrow_plans": null
        }))
        .unwrap();
        assert_eq!(member.status, Status::Busy);
        assert!(member.tomorrow_plans.is_empty());
        assert!(member.notification_enabled);
        assert!(member.holds_busy_invariant());
    }

    #[test]
    fn malformed_expiration_parses_as_none() {
        let mut json = sample_json();
        json["status_expires_at"] = serde_json::json!("not a time");
        let member: MemberRecord = serde_json::from_value(json).unwrap();
        assert_eq!(member.expires_at(), None);
    }

    #[test]
    fn busy_update_clears_label_and_expiration() {
        let member: MemberRecord = serde_json::from_value(sample_json()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        let updated = member.with_update(&StatusUpdate::Busy, now);

        assert_eq!(updated.status, Status::Busy);
        assert_eq!(updated.status_expires_at, None);
        assert_eq!(updated.status_label, None);
        assert_eq!(updated.last_active.as_deref(), Some("2024-01-01T11:00:00.000Z"));
        assert_eq!(updated.tomorrow_plans, member.tomorrow_plans);
    }

    #[test]
    fn status_patch_serializes_explicit_nulls() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        let json = serde_json::to_value(StatusUpdate::Busy.to_patch(now)).unwrap();
        assert_eq!(json["status"], "busy");
        assert!(json["status_expires_at"].is_null());
        assert!(json["status_label"].is_null());
    }

    #[test]
    fn new_member_joins_busy() {
        let member = NewMember::joining(GroupId::new("g"), UserId::new("u"), "  hanako ");
        assert_eq!(member.nickname, "hanako");
        assert_eq!(member.status, Status::Busy);
        assert!(member.tomorrow_plans.is_empty());
        assert!(member.notification_enabled);
    }

    #[test]
    fn register_rejects_blank_nickname() {
        assert!(UserIdentity::register("   ").is_none());
        assert_eq!(UserIdentity::register(" taro ").unwrap().nickname, "taro");
    }

    #[test]
    fn notification_settings_per_group() {
        let mut settings = NotificationSettings::default();
        let group = GroupId::new("g");
        assert!(settings.is_enabled_for(&group));

        settings.set_group(group.clone(), false);
        assert!(!settings.is_enabled_for(&group));
        assert!(settings.is_enabled_for(&GroupId::new("other")));

        settings.enabled = false;
        assert!(!settings.is_enabled_for(&GroupId::new("other")));

        let json = serde_json::to_value(&settings).unwrap();
        assert!(json.get("groupSettings").is_some());
    }
}
