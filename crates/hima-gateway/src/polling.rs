//! Change feed built on periodic re-fetching
//!
//! For backends without a push channel. Each tick re-reads the group's
//! members and reports rows that appeared, changed or disappeared since
//! the previous read.

use hima_api::{ChangeEvent, ChangeFilter, ChangeKind, MemberRecord};
use hima_util::GroupId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::{ChangeFeed, Gateway, Subscription};

/// Polls a gateway and turns member differences into change events
pub struct PollingFeed<G: ?Sized> {
    gateway: Arc<G>,
    interval: Duration,
}

impl<G: Gateway + ?Sized + 'static> PollingFeed<G> {
    pub fn new(gateway: Arc<G>, interval: Duration) -> Self {
        Self { gateway, interval }
    }

    async fn poll_loop(
        gateway: Arc<G>,
        group_id: GroupId,
        interval: Duration,
        tx: mpsc::UnboundedSender<ChangeEvent>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut previous: Option<Vec<MemberRecord>> = None;

        loop {
            ticker.tick().await;

            if tx.is_closed() {
                debug!(group_id = %group_id, "Poll subscriber gone");
                break;
            }

            let current = match gateway.get_group_members(&group_id).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(group_id = %group_id, error = %e, "Member poll failed");
                    continue;
                }
            };

            // First successful read is the baseline
            if let Some(old) = &previous {
                for event in diff_members(old, &current, &group_id) {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
            previous = Some(current);
        }
    }
}

impl<G: Gateway + ?Sized + 'static> ChangeFeed for PollingFeed<G> {
    fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        let Some(group_id) = filter.group_id else {
            warn!("Polling feed needs a group filter; subscription will stay empty");
            return Subscription::new(rx);
        };

        debug!(group_id = %group_id, interval = ?self.interval, "Starting member poll");
        let task = tokio::spawn(Self::poll_loop(
            self.gateway.clone(),
            group_id,
            self.interval,
            tx,
        ));

        Subscription::new(rx).with_task(task)
    }
}

/// Changes between two reads of the same group's members, keyed by user
pub fn diff_members(
    old: &[MemberRecord],
    new: &[MemberRecord],
    group_id: &GroupId,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for member in new {
        let kind = match old.iter().find(|m| m.user_id == member.user_id) {
            None => Some(ChangeKind::Insert),
            Some(before) if before != member => Some(ChangeKind::Update),
            Some(_) => None,
        };
        if let Some(kind) = kind {
            events.push(ChangeEvent::new(
                kind,
                group_id.clone(),
                Some(member.user_id.clone()),
            ));
        }
    }

    for member in old {
        if !new.iter().any(|m| m.user_id == member.user_id) {
            events.push(ChangeEvent::new(
                ChangeKind::Delete,
                group_id.clone(),
                Some(member.user_id.clone()),
            ));
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockGateway;
    use hima_api::{Status, StatusUpdate, UserIdentity};
    use hima_util::{MemberId, UserId};

    fn member(user: &str) -> MemberRecord {
        MemberRecord {
            id: MemberId::new(format!("m-{user}")),
            user_id: UserId::new(user),
            group_id: GroupId::new("g"),
            nickname: user.to_string(),
            status: Status::Busy,
            status_expires_at: None,
            status_label: None,
            tomorrow_plans: Vec::new(),
            notification_enabled: true,
            joined_at: None,
            last_active: None,
        }
    }

    #[test]
    fn diff_reports_insert_update_delete() {
        let group = GroupId::new("g");
        let old = vec![member("a"), member("b")];
        let mut changed = member("b");
        changed.status = Status::Free;
        let new = vec![changed, member("c")];

        let events = diff_members(&old, &new, &group);
        let summary: Vec<_> = events
            .iter()
            .map(|e| (e.kind, e.user_id.as_ref().map(|u| u.as_str().to_string())))
            .collect();

        assert_eq!(
            summary,
            vec![
                (ChangeKind::Update, Some("b".to_string())),
                (ChangeKind::Insert, Some("c".to_string())),
                (ChangeKind::Delete, Some("a".to_string())),
            ]
        );
    }

    #[test]
    fn diff_of_identical_reads_is_empty() {
        let rows = vec![member("a"), member("b")];
        assert!(diff_members(&rows, &rows, &GroupId::new("g")).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_reports_changes_after_baseline() {
        let gateway = Arc::new(MockGateway::new());
        let group = gateway.seed_group("g");
        let taro = UserIdentity::register("taro").unwrap();
        gateway.join_group(&group.id, &taro).await.unwrap();

        let feed = PollingFeed::new(gateway.clone(), Duration::from_secs(5));
        let mut subscription = feed.subscribe(ChangeFilter::group(group.id.clone()));

        // Let the baseline read happen
        tokio::time::sleep(Duration::from_secs(1)).await;

        gateway
            .update_member_status(
                &group.id,
                &taro.id,
                &StatusUpdate::Free {
                    expires_at: None,
                    label: None,
                },
            )
            .await
            .unwrap();

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.user_id, Some(taro.id));
    }

    #[tokio::test]
    async fn subscription_without_group_is_closed() {
        let gateway = Arc::new(MockGateway::new());
        let feed = PollingFeed::new(gateway, Duration::from_secs(5));

        let mut subscription = feed.subscribe(ChangeFilter::all());
        assert!(subscription.recv().await.is_none());
    }
}
