//! Status and tomorrow-plan options

/// How a free status ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationRule {
    /// Ends this many hours after it was set
    Hours(u32),
    /// Ends at the next day's rollover
    AllDay,
    /// Never ends on its own
    None,
}

/// A "how long are you free" choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusOption {
    pub id: &'static str,
    pub label: &'static str,
    pub rule: ExpirationRule,
}

/// A time slot someone can mark for tomorrow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TomorrowPlanOption {
    pub id: &'static str,
    pub label: &'static str,
    pub emoji: &'static str,
}

impl TomorrowPlanOption {
    /// Emoji followed by label, e.g. `🌙夜`
    pub fn display(&self) -> String {
        format!("{}{}", self.emoji, self.label)
    }
}

pub const STATUS_OPTIONS: &[StatusOption] = &[
    StatusOption {
        id: "free_2h",
        label: "あと2時間暇",
        rule: ExpirationRule::Hours(2),
    },
    StatusOption {
        id: "free_3h",
        label: "あと3時間暇",
        rule: ExpirationRule::Hours(3),
    },
    StatusOption {
        id: "free_4h",
        label: "あと4時間暇",
        rule: ExpirationRule::Hours(4),
    },
    StatusOption {
        id: "free_6h",
        label: "あと6時間暇",
        rule: ExpirationRule::Hours(6),
    },
    StatusOption {
        id: "free_today",
        label: "今日は暇",
        rule: ExpirationRule::AllDay,
    },
    StatusOption {
        id: "free_mostly",
        label: "途中ちょい用事あるけど大体暇",
        rule: ExpirationRule::AllDay,
    },
];

pub const TOMORROW_PLAN_OPTIONS: &[TomorrowPlanOption] = &[
    TomorrowPlanOption {
        id: "lunch",
        label: "昼",
        emoji: "🌤️",
    },
    TomorrowPlanOption {
        id: "evening",
        label: "夕方",
        emoji: "🌅",
    },
    TomorrowPlanOption {
        id: "night",
        label: "夜",
        emoji: "🌙",
    },
    TomorrowPlanOption {
        id: "late_night",
        label: "深夜",
        emoji: "🌃",
    },
];

pub fn status_option(id: &str) -> Option<&'static StatusOption> {
    STATUS_OPTIONS.iter().find(|o| o.id == id)
}

pub fn tomorrow_plan_option(id: &str) -> Option<&'static TomorrowPlanOption> {
    TOMORROW_PLAN_OPTIONS.iter().find(|o| o.id == id)
}

/// Display text for a member's plans, in their order. Unknown ids are skipped.
pub fn plan_labels(plan_ids: &[String]) -> String {
    plan_ids
        .iter()
        .filter_map(|id| tomorrow_plan_option(id))
        .map(TomorrowPlanOption::display)
        .collect::<Vec<_>>()
        .join(" ")
}
