//! Terminal output for group snapshots and option lists

use hima_api::{Group, NotificationSettings, Status};
use hima_config::Locale;
use hima_core::{GroupSnapshot, MemberView, STATUS_OPTIONS, TOMORROW_PLAN_OPTIONS};
use std::fmt::Write;

struct Words {
    free: &'static str,
    tomorrow: &'static str,
    nobody_free: &'static str,
}

fn words(locale: Locale) -> Words {
    match locale {
        Locale::Ja => Words {
            free: "暇",
            tomorrow: "明日",
            nobody_free: "今は誰も暇じゃない",
        },
        Locale::En => Words {
            free: "free",
            tomorrow: "tomorrow",
            nobody_free: "nobody is free right now",
        },
    }
}

fn member_line(member: &MemberView, locale: Locale) -> String {
    let marker = if member.is_me { '*' } else { ' ' };
    let mut line = format!("{} {:<12} {}", marker, member.nickname, member.badge);

    if let Some(remaining) = &member.time_remaining {
        let _ = write!(line, " ({})", remaining);
    }
    if !member.plans.is_empty() {
        let _ = write!(line, "  {}: {}", words(locale).tomorrow, member.plans);
    }
    line
}

/// Group header followed by one line per member
pub fn snapshot(snapshot: &GroupSnapshot, free_only: bool, locale: Locale) -> String {
    let w = words(locale);
    let mut out = format!(
        "{}  {}: {}\n",
        snapshot.group.name,
        w.free,
        snapshot.free_ratio()
    );

    let members: Vec<&MemberView> = if free_only {
        snapshot.free_members().collect()
    } else {
        snapshot.members.iter().collect()
    };

    if free_only && members.is_empty() {
        let _ = writeln!(out, "  {}", w.nobody_free);
    }
    for member in members {
        let _ = writeln!(out, "{}", member_line(member, locale));
    }
    out
}

pub fn group_list(groups: &[Group]) -> String {
    let mut out = String::new();
    for group in groups {
        let _ = writeln!(out, "{}  {}  [{}]", group.id, group.name, group.invite_code);
    }
    out
}

/// Every status and plan id with its label
pub fn options() -> String {
    let mut out = String::from("status:\n");
    for option in STATUS_OPTIONS {
        let _ = writeln!(out, "  {:<12} {}", option.id, option.label);
    }
    out.push_str("plans:\n");
    for plan in TOMORROW_PLAN_OPTIONS {
        let _ = writeln!(out, "  {:<12} {}", plan.id, plan.display());
    }
    out
}

pub fn notification_settings(settings: &NotificationSettings) -> String {
    let on_off = |enabled: bool| if enabled { "on" } else { "off" };
    let mut out = format!("notifications: {}\n", on_off(settings.enabled));
    for (group, enabled) in &settings.group_settings {
        let _ = writeln!(out, "  {}: {}", group, on_off(*enabled));
    }
    out
}

pub fn status_word(status: Status, locale: Locale) -> &'static str {
    match (status, locale) {
        (Status::Free, Locale::Ja) => "暇",
        (Status::Busy, Locale::Ja) => "暇じゃない",
        (Status::Free, Locale::En) => "free",
        (Status::Busy, Locale::En) => "busy",
    }
}
