//! Display-ready group state

use chrono::{DateTime, Local, Utc};
use hima_api::{Group, MemberRecord, Status};
use hima_config::Locale;
use hima_util::UserId;

use crate::{plan_labels, plans_are_stale, TimeRemaining};

/// One member as shown in a group listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberView {
    pub user_id: UserId,
    pub nickname: String,
    pub status: Status,
    pub badge: String,
    /// Only for free members with an end time
    pub time_remaining: Option<String>,
    /// Tomorrow plans as display text. Empty when none, or when they were
    /// last written before the latest local rollover.
    pub plans: String,
    pub is_me: bool,
}

impl MemberView {
    pub fn new(
        member: &MemberRecord,
        me: Option<&UserId>,
        now: DateTime<Utc>,
        locale: Locale,
    ) -> Self {
        let time_remaining = if member.is_free() {
            TimeRemaining::until(member.expires_at(), now).map(|r| r.render(locale))
        } else {
            None
        };

        let last_active = member.last_active.as_deref().and_then(hima_util::parse_instant);
        let plans = if plans_are_stale(last_active, &now.with_timezone(&Local)) {
            String::new()
        } else {
            plan_labels(&member.tomorrow_plans)
        };

        Self {
            user_id: member.user_id.clone(),
            nickname: member.nickname.clone(),
            status: member.status,
            badge: badge_text(member, locale),
            time_remaining,
            plans,
            is_me: me == Some(&member.user_id),
        }
    }
}

/// Status badge: the chosen label when free, a fixed word otherwise
pub fn badge_text(member: &MemberRecord, locale: Locale) -> String {
    match (member.status, locale) {
        (Status::Busy, Locale::Ja) => "暇じゃない".to_string(),
        (Status::Busy, Locale::En) => "busy".to_string(),
        (Status::Free, _) => match member.status_label.as_deref() {
            Some(label) if !label.is_empty() => label.to_string(),
            _ if locale == Locale::Ja => "暇".to_string(),
            _ => "free".to_string(),
        },
    }
}

/// A group and its members at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    pub group: Group,
    pub members: Vec<MemberView>,
    pub taken_at: DateTime<Utc>,
}

impl GroupSnapshot {
    /// Build from already reconciled rows, keeping their order
    pub fn build(
        group: &Group,
        members: &[MemberRecord],
        me: Option<&UserId>,
        now: DateTime<Utc>,
        locale: Locale,
    ) -> Self {
        Self {
            group: group.clone(),
            members: members
                .iter()
                .map(|m| MemberView::new(m, me, now, locale))
                .collect(),
            taken_at: now,
        }
    }

    pub fn free_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.status == Status::Free)
            .count()
    }

    /// `free/total`, e.g. `3/5`
    pub fn free_ratio(&self) -> String {
        format!("{}/{}", self.free_count(), self.members.len())
    }

    pub fn free_members(&self) -> impl Iterator<Item = &MemberView> {
        self.members.iter().filter(|m| m.status == Status::Free)
    }

    pub fn me(&self) -> Option<&MemberView> {
        self.members.iter().find(|m| m.is_me)
    }
}

/// Shareable invitation text with link and code
pub fn invite_message(group: &Group, invite_base_url: &str, locale: Locale) -> String {
    let url = group.invite_code.invite_url(invite_base_url);
    match locale {
        Locale::Ja => format!(
            "暇ステータス管理アプリのグループ「{}」に参加してください！\n\n招待リンク: {}\n\n（または招待コード: {} を手動入力）",
            group.name, url, group.invite_code
        ),
        Locale::En => format!(
            "Join \"{}\" to share when you're free!\n\nInvite link: {}\n\n(or enter the invite code {} manually)",
            group.name, url, group.invite_code
        ),
    }
}
