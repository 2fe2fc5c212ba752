//! Change notifications from the backend's change feed

use hima_util::{GroupId, UserId};
use serde::{Deserialize, Serialize};

/// What happened to a member row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A change to a member row of some group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub group_id: GroupId,
    /// The affected member's user, when the feed knows it
    pub user_id: Option<UserId>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, group_id: GroupId, user_id: Option<UserId>) -> Self {
        Self {
            kind,
            group_id,
            user_id,
        }
    }
}

/// Which changes a subscriber wants to hear about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    /// Only changes to this group's members; `None` for every group
    pub group_id: Option<GroupId>,
}

impl ChangeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn group(group_id: GroupId) -> Self {
        Self {
            group_id: Some(group_id),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.group_id
            .as_ref()
            .is_none_or(|group| group == &event.group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_filter_matches_only_its_group() {
        let filter = ChangeFilter::group(GroupId::new("g1"));
        let mine = ChangeEvent::new(ChangeKind::Update, GroupId::new("g1"), None);
        let other = ChangeEvent::new(ChangeKind::Update, GroupId::new("g2"), None);

        assert!(filter.matches(&mine));
        assert!(!filter.matches(&other));
        assert!(ChangeFilter::all().matches(&other));
    }
}
