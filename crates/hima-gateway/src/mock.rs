//! In-memory gateway for testing

use async_trait::async_trait;
use hima_api::{
    ChangeEvent, ChangeFilter, ChangeKind, Group, MemberRecord, NewGroup, NewMember,
    StatusUpdate,
};
use hima_util::{GroupId, InviteCode, MemberId, UserId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::{ChangeFeed, Gateway, GatewayError, GatewayResult, Subscription};

/// A status write the mock received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatusUpdate {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub update: StatusUpdate,
}

#[derive(Default)]
struct MockState {
    groups: Vec<Group>,
    members: Vec<MemberRecord>,
    status_updates: Vec<RecordedStatusUpdate>,
    subscribers: Vec<(ChangeFilter, mpsc::UnboundedSender<ChangeEvent>)>,
}

/// In-memory backend for unit and integration testing.
///
/// Writes are applied immediately and published to subscribers, the way the
/// hosted backend's change feed would report them.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
    next_id: AtomicU64,

    /// Make status and plan writes fail
    fail_writes: AtomicBool,

    /// Make reads fail
    fail_reads: AtomicBool,

    /// Latency added before each status write, in milliseconds
    write_delay_ms: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make status writes take at least `delay`
    pub fn set_write_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Add a group directly, bypassing membership
    pub fn seed_group(&self, name: &str) -> Group {
        let group = Group {
            id: GroupId::new(self.next_id("group")),
            name: name.to_string(),
            invite_code: InviteCode::generate(),
            created_at: Some(hima_util::format_instant(&hima_util::now_utc())),
            created_by: None,
        };
        self.state().groups.push(group.clone());
        group
    }

    /// Add a member row as-is, without publishing a change
    pub fn seed_member(&self, member: MemberRecord) {
        self.state().members.push(member);
    }

    /// Current rows of a group, in insertion order
    pub fn members_of(&self, group_id: &GroupId) -> Vec<MemberRecord> {
        self.state()
            .members
            .iter()
            .filter(|m| &m.group_id == group_id)
            .cloned()
            .collect()
    }

    /// Every status write received so far
    pub fn status_updates(&self) -> Vec<RecordedStatusUpdate> {
        self.state().status_updates.clone()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state();
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state.subscribers.len()
    }

    fn publish(state: &mut MockState, event: ChangeEvent) {
        state.subscribers.retain(|(filter, tx)| {
            if filter.matches(&event) {
                tx.send(event.clone()).is_ok()
            } else {
                !tx.is_closed()
            }
        });
    }

    fn check_reads(&self) -> GatewayResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("Mock read failure".into()));
        }
        Ok(())
    }

    fn check_writes(&self) -> GatewayResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("Mock write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn get_group(&self, group_id: &GroupId) -> GatewayResult<Option<Group>> {
        self.check_reads()?;
        Ok(self
            .state()
            .groups
            .iter()
            .find(|g| &g.id == group_id)
            .cloned())
    }

    async fn get_group_by_invite_code(&self, code: &InviteCode) -> GatewayResult<Option<Group>> {
        self.check_reads()?;
        Ok(self
            .state()
            .groups
            .iter()
            .find(|g| g.invite_code.as_str().eq_ignore_ascii_case(code.as_str()))
            .cloned())
    }

    async fn get_user_groups(&self, user_id: &UserId) -> GatewayResult<Vec<Group>> {
        self.check_reads()?;
        let state = self.state();
        Ok(state
            .members
            .iter()
            .filter(|m| &m.user_id == user_id)
            .filter_map(|m| state.groups.iter().find(|g| g.id == m.group_id).cloned())
            .collect())
    }

    async fn get_group_members(&self, group_id: &GroupId) -> GatewayResult<Vec<MemberRecord>> {
        self.check_reads()?;
        let mut members = self.members_of(group_id);
        // Stable sort keeps insertion order for rows without a timestamp
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(members)
    }

    async fn find_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> GatewayResult<Option<MemberRecord>> {
        self.check_reads()?;
        Ok(self
            .state()
            .members
            .iter()
            .find(|m| &m.group_id == group_id && &m.user_id == user_id)
            .cloned())
    }

    async fn insert_group(&self, group: &NewGroup) -> GatewayResult<Group> {
        self.check_writes()?;
        let created = Group {
            id: GroupId::new(self.next_id("group")),
            name: group.name.clone(),
            invite_code: group.invite_code.clone(),
            created_at: Some(hima_util::format_instant(&hima_util::now_utc())),
            created_by: Some(group.created_by.clone()),
        };
        self.state().groups.push(created.clone());
        Ok(created)
    }

    async fn insert_member(&self, member: &NewMember) -> GatewayResult<MemberRecord> {
        self.check_writes()?;
        let now = hima_util::format_instant(&hima_util::now_utc());
        let record = MemberRecord {
            id: MemberId::new(self.next_id("member")),
            user_id: member.user_id.clone(),
            group_id: member.group_id.clone(),
            nickname: member.nickname.clone(),
            status: member.status,
            status_expires_at: None,
            status_label: None,
            tomorrow_plans: member.tomorrow_plans.clone(),
            notification_enabled: member.notification_enabled,
            joined_at: Some(now.clone()),
            last_active: Some(now),
        };

        let mut state = self.state();
        state.members.push(record.clone());
        Self::publish(
            &mut state,
            ChangeEvent::new(
                ChangeKind::Insert,
                record.group_id.clone(),
                Some(record.user_id.clone()),
            ),
        );
        Ok(record)
    }

    async fn update_member_status(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        update: &StatusUpdate,
    ) -> GatewayResult<()> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check_writes()?;
        let now = hima_util::now_utc();
        let mut state = self.state();

        state.status_updates.push(RecordedStatusUpdate {
            group_id: group_id.clone(),
            user_id: user_id.clone(),
            update: update.clone(),
        });

        // Like a filtered SQL UPDATE, zero matching rows is not an error
        let mut changed = false;
        for member in state
            .members
            .iter_mut()
            .filter(|m| &m.group_id == group_id && &m.user_id == user_id)
        {
            *member = member.with_update(update, now);
            changed = true;
        }

        if changed {
            Self::publish(
                &mut state,
                ChangeEvent::new(ChangeKind::Update, group_id.clone(), Some(user_id.clone())),
            );
        }
        Ok(())
    }

    async fn update_tomorrow_plans(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        plans: &[String],
    ) -> GatewayResult<()> {
        self.check_writes()?;
        let last_active = hima_util::format_instant(&hima_util::now_utc());
        let mut state = self.state();

        let mut changed = false;
        for member in state
            .members
            .iter_mut()
            .filter(|m| &m.group_id == group_id && &m.user_id == user_id)
        {
            member.tomorrow_plans = plans.to_vec();
            member.last_active = Some(last_active.clone());
            changed = true;
        }

        if changed {
            Self::publish(
                &mut state,
                ChangeEvent::new(ChangeKind::Update, group_id.clone(), Some(user_id.clone())),
            );
        }
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        !self.fail_reads.load(Ordering::SeqCst)
    }
}

impl ChangeFeed for MockGateway {
    fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().subscribers.push((filter, tx));
        Subscription::new(rx)
    }
}
