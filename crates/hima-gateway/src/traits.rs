//! Gateway and change-feed traits

use async_trait::async_trait;
use hima_api::{
    ChangeEvent, ChangeFilter, Group, MemberRecord, NewGroup, NewMember, StatusUpdate,
    UserIdentity,
};
use hima_util::{GroupId, HimaError, InviteCode, UserId};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Errors from backend operations.
///
/// The reconciler treats every variant as an opaque diagnostic; only
/// user-initiated operations branch on them.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already a member of group {0}")]
    AlreadyMember(GroupId),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<GatewayError> for HimaError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::AlreadyMember(group_id) => HimaError::AlreadyMember(group_id),
            other => HimaError::gateway(other.to_string()),
        }
    }
}

/// Request/response access to the hosted backend
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Fetch a group by id
    async fn get_group(&self, group_id: &GroupId) -> GatewayResult<Option<Group>>;

    /// Fetch a group by its invite code
    async fn get_group_by_invite_code(&self, code: &InviteCode) -> GatewayResult<Option<Group>>;

    /// Groups the user is a member of
    async fn get_user_groups(&self, user_id: &UserId) -> GatewayResult<Vec<Group>>;

    /// Members of a group, oldest membership first
    async fn get_group_members(&self, group_id: &GroupId) -> GatewayResult<Vec<MemberRecord>>;

    /// A single membership row
    async fn find_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> GatewayResult<Option<MemberRecord>>;

    /// Insert a group row
    async fn insert_group(&self, group: &NewGroup) -> GatewayResult<Group>;

    /// Insert a membership row
    async fn insert_member(&self, member: &NewMember) -> GatewayResult<MemberRecord>;

    /// Write a member's status, stamping `last_active`
    async fn update_member_status(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        update: &StatusUpdate,
    ) -> GatewayResult<()>;

    /// Replace a member's tomorrow plans, stamping `last_active`
    async fn update_tomorrow_plans(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        plans: &[String],
    ) -> GatewayResult<()>;

    /// Join a group as busy. Fails with `AlreadyMember` when the user is
    /// already in it.
    async fn join_group(
        &self,
        group_id: &GroupId,
        user: &UserIdentity,
    ) -> GatewayResult<MemberRecord> {
        if self.find_member(group_id, &user.id).await?.is_some() {
            debug!(group_id = %group_id, user_id = %user.id, "Already joined");
            return Err(GatewayError::AlreadyMember(group_id.clone()));
        }

        let member = self
            .insert_member(&NewMember::joining(
                group_id.clone(),
                user.id.clone(),
                &user.nickname,
            ))
            .await?;

        info!(group_id = %group_id, user_id = %user.id, "Joined group");
        Ok(member)
    }

    /// Create a group with a fresh invite code; the creator joins it
    async fn create_group(&self, name: &str, creator: &UserIdentity) -> GatewayResult<Group> {
        let group = self
            .insert_group(&NewGroup {
                name: name.trim().to_string(),
                invite_code: InviteCode::generate(),
                created_by: creator.id.clone(),
            })
            .await?;

        self.join_group(&group.id, creator).await?;

        info!(group_id = %group.id, invite_code = %group.invite_code, "Group created");
        Ok(group)
    }

    /// Check if the backend is reachable
    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Subscribe/callback access to backend changes
pub trait ChangeFeed: Send + Sync {
    /// Start receiving changes matching `filter`
    fn subscribe(&self, filter: ChangeFilter) -> Subscription;
}

/// A live change-feed subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            receiver,
            task: None,
        }
    }

    /// Tie a background producer task to this subscription's lifetime
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Next change, or `None` once the feed has closed
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Next change if one is already queued
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }

    /// Stop receiving changes
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
