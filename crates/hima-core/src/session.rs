//! Application context and per-group sessions
//!
//! `AppContext` carries everything an operation needs (gateway, local profile,
//! display settings) and is passed explicitly. A `GroupSession` is one user's
//! view of one group: it refreshes members through the reconciler and applies
//! that user's status and plan changes.

use chrono::{DateTime, TimeZone, Utc};
use hima_api::{Group, MemberRecord, NotificationSettings, StatusUpdate, UserIdentity};
use hima_config::{Config, Locale, WriteThroughMode, DEFAULT_INVITE_BASE_URL};
use hima_gateway::Gateway;
use hima_store::Store;
use hima_util::{GroupId, HimaError, InviteCode, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    await_writes, compute_expiration, invite_message, status_option, tomorrow_plan_option,
    GroupSnapshot, Reconciler, WriteReport,
};

/// Settings that shape how sessions behave and render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub locale: Locale,
    pub write_through: WriteThroughMode,
    pub invite_base_url: String,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            locale: config.app.locale,
            write_through: config.sync.write_through,
            invite_base_url: config.app.invite_base_url.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            write_through: WriteThroughMode::default(),
            invite_base_url: DEFAULT_INVITE_BASE_URL.to_string(),
        }
    }
}

/// The device-local side of hima: who the user is and what they want to be
/// notified about. Works without a backend.
#[derive(Clone)]
pub struct Profile {
    store: Arc<dyn Store>,
}

impl Profile {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The registered local user
    pub fn current_user(&self) -> Result<UserIdentity> {
        self.store.get_user()?.ok_or(HimaError::NoUser)
    }

    /// Register a nickname on this device, replacing any previous identity
    pub fn register_user(&self, nickname: &str) -> Result<UserIdentity> {
        let user = UserIdentity::register(nickname)
            .ok_or_else(|| HimaError::validation("Nickname must not be empty"))?;
        self.store.set_user(&user)?;
        info!(user_id = %user.id, nickname = %user.nickname, "User registered");
        Ok(user)
    }

    /// Forget the local identity
    pub fn logout(&self) -> Result<()> {
        self.store.clear_user()?;
        info!("User cleared");
        Ok(())
    }

    pub fn notification_settings(&self) -> NotificationSettings {
        self.store.notification_settings()
    }

    /// Turn every notification on or off
    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<NotificationSettings> {
        let mut settings = self.store.notification_settings();
        settings.enabled = enabled;
        self.store.set_notification_settings(&settings)?;
        info!(enabled, "Notification setting saved");
        Ok(settings)
    }

    /// Override notifications for one group
    pub fn set_group_notifications(
        &self,
        group_id: &GroupId,
        enabled: bool,
    ) -> Result<NotificationSettings> {
        let mut settings = self.store.notification_settings();
        settings.set_group(group_id.clone(), enabled);
        self.store.set_notification_settings(&settings)?;
        info!(group_id = %group_id, enabled, "Group notification setting saved");
        Ok(settings)
    }
}

/// Shared handles for every hima operation
#[derive(Clone)]
pub struct AppContext {
    gateway: Arc<dyn Gateway>,
    profile: Profile,
    settings: SessionSettings,
}

impl AppContext {
    pub fn new(gateway: Arc<dyn Gateway>, profile: Profile, settings: SessionSettings) -> Self {
        Self {
            gateway,
            profile,
            settings,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn current_user(&self) -> Result<UserIdentity> {
        self.profile.current_user()
    }

    pub async fn my_groups(&self) -> Result<Vec<Group>> {
        let user = self.current_user()?;
        Ok(self.gateway.get_user_groups(&user.id).await?)
    }

    /// Create a group; the current user becomes its first member
    pub async fn create_group(&self, name: &str) -> Result<Group> {
        if name.trim().is_empty() {
            return Err(HimaError::validation("Group name must not be empty"));
        }
        let user = self.current_user()?;
        Ok(self.gateway.create_group(name, &user).await?)
    }

    /// Join by invite code or invite link
    pub async fn join_group(&self, code_or_url: &str) -> Result<Group> {
        let code = InviteCode::from_code_or_url(code_or_url).ok_or_else(|| {
            HimaError::validation(format!("Not an invite code or link: {}", code_or_url.trim()))
        })?;
        let user = self.current_user()?;

        let group = self
            .gateway
            .get_group_by_invite_code(&code)
            .await?
            .ok_or(HimaError::InviteCodeNotFound(code))?;

        self.gateway.join_group(&group.id, &user).await?;
        Ok(group)
    }

    pub fn invite_url(&self, group: &Group) -> String {
        group.invite_code.invite_url(&self.settings.invite_base_url)
    }

    pub fn invite_message(&self, group: &Group) -> String {
        invite_message(group, &self.settings.invite_base_url, self.settings.locale)
    }

    /// Start a session on `group_id` as the current user
    pub fn open_group(&self, group_id: GroupId) -> Result<GroupSession> {
        let user = self.current_user()?;
        Ok(GroupSession::new(self.clone(), group_id, user))
    }
}

/// Status write for picking a free option at `now`
pub fn free_status_update<Tz: TimeZone>(option_id: &str, now: &DateTime<Tz>) -> Result<StatusUpdate> {
    let option =
        status_option(option_id).ok_or_else(|| HimaError::UnknownStatusOption(option_id.into()))?;

    Ok(StatusUpdate::Free {
        expires_at: compute_expiration(option, now).map(|dt| dt.with_timezone(&Utc)),
        label: Some(option.label.to_string()),
    })
}

/// One user's live view of one group
pub struct GroupSession {
    ctx: AppContext,
    group_id: GroupId,
    user: UserIdentity,
    reconciler: Reconciler,
    group: Option<Group>,
    members: Vec<MemberRecord>,
    selected_plans: Vec<String>,
    last_write_report: Option<WriteReport>,
    /// Fire-and-forget downgrade writes not yet known to be finished
    pending_writes: Vec<JoinHandle<bool>>,
}

impl GroupSession {
    pub fn new(ctx: AppContext, group_id: GroupId, user: UserIdentity) -> Self {
        let reconciler = Reconciler::new(ctx.gateway.clone());
        Self {
            ctx,
            group_id,
            user,
            reconciler,
            group: None,
            members: Vec::new(),
            selected_plans: Vec::new(),
            last_write_report: None,
            pending_writes: Vec::new(),
        }
    }

    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    /// Reconciled members from the last refresh
    pub fn members(&self) -> &[MemberRecord] {
        &self.members
    }

    /// Write outcome of the last refresh, when writes were awaited
    pub fn last_write_report(&self) -> Option<WriteReport> {
        self.last_write_report
    }

    /// Whether fire-and-forget downgrade writes may still be running
    pub fn has_pending_writes(&self) -> bool {
        self.pending_writes.iter().any(|handle| !handle.is_finished())
    }

    /// Wait for the downgrade writes earlier refreshes left running.
    ///
    /// Spawned writes are cancelled when the runtime shuts down, so a
    /// short-lived caller must flush before it exits.
    pub async fn flush(&mut self) -> WriteReport {
        let pending = std::mem::take(&mut self.pending_writes);
        let report = await_writes(pending).await;
        if report.failed > 0 {
            warn!(
                group_id = %self.group_id,
                failed = report.failed,
                "Some downgrades were not persisted"
            );
        }
        report
    }

    pub async fn refresh(&mut self) -> Result<GroupSnapshot> {
        self.refresh_at(hima_util::now_utc()).await
    }

    /// Fetch the group and its members, reconciling expired statuses as of `now`
    pub async fn refresh_at(&mut self, now: DateTime<Utc>) -> Result<GroupSnapshot> {
        let gateway = &self.ctx.gateway;
        let group = gateway
            .get_group(&self.group_id)
            .await?
            .ok_or_else(|| HimaError::GroupNotFound(self.group_id.clone()))?;
        let fetched = gateway.get_group_members(&self.group_id).await?;

        let sweep = self.reconciler.sweep(&fetched, now);
        let downgraded = sweep.downgraded.len();
        let members = match self.ctx.settings.write_through {
            WriteThroughMode::FireAndForget => {
                self.last_write_report = None;
                let (members, pending) = sweep.detach();
                self.pending_writes.retain(|handle| !handle.is_finished());
                self.pending_writes.extend(pending);
                members
            }
            WriteThroughMode::Await => {
                let (members, report) = sweep.settle().await;
                self.last_write_report = Some(report);
                members
            }
        };

        if let Some(me) = members.iter().find(|m| m.user_id == self.user.id) {
            self.selected_plans = me.tomorrow_plans.clone();
        }

        debug!(
            group_id = %self.group_id,
            members = members.len(),
            downgraded,
            "Group refreshed"
        );

        self.group = Some(group);
        self.members = members;
        self.snapshot(now)
            .ok_or_else(|| HimaError::internal("Group missing after refresh"))
    }

    /// Snapshot of the last refresh, rendered as of `now`
    pub fn snapshot(&self, now: DateTime<Utc>) -> Option<GroupSnapshot> {
        let group = self.group.as_ref()?;
        Some(GroupSnapshot::build(
            group,
            &self.members,
            Some(&self.user.id),
            now,
            self.ctx.settings.locale,
        ))
    }

    /// Mark the user free with one of the catalog options
    pub async fn set_free(&mut self, option_id: &str) -> Result<GroupSnapshot> {
        let update = free_status_update(option_id, &hima_util::now())?;
        self.apply_status(update).await
    }

    pub async fn set_busy(&mut self) -> Result<GroupSnapshot> {
        self.apply_status(StatusUpdate::Busy).await
    }

    /// Write a status for the user, then refresh
    pub async fn apply_status(&mut self, update: StatusUpdate) -> Result<GroupSnapshot> {
        self.ctx
            .gateway
            .update_member_status(&self.group_id, &self.user.id, &update)
            .await?;

        info!(
            group_id = %self.group_id,
            status = %update.status(),
            label = ?update.label(),
            expires_at = ?update.expires_at(),
            "Status updated"
        );
        self.refresh().await
    }

    /// Plans currently selected for tomorrow, in selection order
    pub fn selected_plans(&self) -> &[String] {
        &self.selected_plans
    }

    /// Select or deselect a plan. Returns whether it is now selected.
    pub fn toggle_plan(&mut self, plan_id: &str) -> Result<bool> {
        if tomorrow_plan_option(plan_id).is_none() {
            return Err(HimaError::UnknownPlan(plan_id.to_string()));
        }

        if let Some(pos) = self.selected_plans.iter().position(|p| p == plan_id) {
            self.selected_plans.remove(pos);
            Ok(false)
        } else {
            self.selected_plans.push(plan_id.to_string());
            Ok(true)
        }
    }

    /// Replace the selection without saving
    pub fn select_plans(&mut self, plan_ids: Vec<String>) -> Result<()> {
        if let Some(unknown) = plan_ids.iter().find(|p| tomorrow_plan_option(p).is_none()) {
            return Err(HimaError::UnknownPlan(unknown.clone()));
        }
        self.selected_plans = plan_ids;
        Ok(())
    }

    /// Persist the selection, then refresh
    pub async fn save_tomorrow_plans(&mut self) -> Result<GroupSnapshot> {
        if let Some(unknown) = self
            .selected_plans
            .iter()
            .find(|p| tomorrow_plan_option(p).is_none())
        {
            return Err(HimaError::UnknownPlan(unknown.clone()));
        }

        self.ctx
            .gateway
            .update_tomorrow_plans(&self.group_id, &self.user.id, &self.selected_plans)
            .await?;

        info!(group_id = %self.group_id, plans = ?self.selected_plans, "Tomorrow plans saved");
        self.refresh().await
    }
}
