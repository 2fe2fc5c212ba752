//! Member lifecycle reconciliation
//!
//! A member's free status ends on its own once its expiration passes. Nobody
//! is online at that moment to flip it, so every refresh sweeps the fetched
//! rows: expired members are shown as busy right away and the downgrade is
//! written back to the backend in the background.
//!
//! Busy rows that still carry an expiration or label are cleared as well:
//! keeping busy rows free of both takes priority over passing them through.

use chrono::{DateTime, Utc};
use hima_api::{MemberRecord, Status, StatusUpdate};
use hima_gateway::Gateway;
use hima_util::{GroupId, UserId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::is_expired;

/// Why a row needs correcting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correction {
    /// Free status past its expiration; persisted
    Expired,
    /// Busy row carrying a stale expiration or label; fixed in the view only
    Normalize,
}

fn correction(member: &MemberRecord, now: DateTime<Utc>) -> Option<Correction> {
    match member.status {
        Status::Free => {
            let expires_at = member.expires_at();
            if expires_at.is_none() && member.status_expires_at.is_some() {
                debug!(
                    user_id = %member.user_id,
                    value = ?member.status_expires_at,
                    "Unparseable expiration, treating status as open-ended"
                );
            }
            is_expired(expires_at, now).then_some(Correction::Expired)
        }
        Status::Busy => (!member.holds_busy_invariant()).then_some(Correction::Normalize),
    }
}

/// Corrected copy of `members`: same order and length, expired free members
/// downgraded to busy. Never fails and has no side effects.
pub fn reconcile(members: &[MemberRecord], now: DateTime<Utc>) -> Vec<MemberRecord> {
    members
        .iter()
        .map(|member| match correction(member, now) {
            Some(_) => member.downgraded(),
            None => member.clone(),
        })
        .collect()
}

/// Outcome of a sweep's background writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub failed: usize,
}

/// Result of reconciling one fetch
#[derive(Debug)]
pub struct Sweep {
    /// Corrected rows, ready to display
    pub members: Vec<MemberRecord>,
    /// Users whose expired status was downgraded
    pub downgraded: Vec<UserId>,
    pending: Vec<JoinHandle<bool>>,
}

impl Sweep {
    /// Whether any downgrade writes were started
    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Keep the corrected rows and let the writes finish on their own.
    ///
    /// The writes are cancelled if the runtime shuts down first; use
    /// [`Sweep::detach`] to hold on to them.
    pub fn into_members(self) -> Vec<MemberRecord> {
        self.members
    }

    /// Corrected rows plus the handles of the writes still in flight
    pub fn detach(self) -> (Vec<MemberRecord>, Vec<JoinHandle<bool>>) {
        (self.members, self.pending)
    }

    /// Wait for every downgrade write. Failures are counted, not returned.
    pub async fn settle(self) -> (Vec<MemberRecord>, WriteReport) {
        let report = await_writes(self.pending).await;
        (self.members, report)
    }
}

/// Wait for spawned downgrade writes and count their outcomes
pub async fn await_writes(handles: Vec<JoinHandle<bool>>) -> WriteReport {
    let mut report = WriteReport::default();
    for handle in handles {
        match handle.await {
            Ok(true) => report.written += 1,
            Ok(false) => report.failed += 1,
            Err(e) => {
                warn!(error = %e, "Downgrade write task did not complete");
                report.failed += 1;
            }
        }
    }
    report
}

/// Reconciles fetched members and writes downgrades through a gateway
#[derive(Clone)]
pub struct Reconciler {
    gateway: Arc<dyn Gateway>,
}

impl Reconciler {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Reconcile `members` and start one busy write per expired member.
    ///
    /// Returns as soon as the writes are spawned. Must be called from within
    /// a tokio runtime.
    pub fn sweep(&self, members: &[MemberRecord], now: DateTime<Utc>) -> Sweep {
        let mut corrected = Vec::with_capacity(members.len());
        let mut downgraded = Vec::new();
        let mut pending = Vec::new();

        for member in members {
            match correction(member, now) {
                Some(Correction::Expired) => {
                    info!(
                        group_id = %member.group_id,
                        user_id = %member.user_id,
                        expires_at = ?member.status_expires_at,
                        "Free status expired, downgrading to busy"
                    );
                    pending.push(self.spawn_downgrade(
                        member.group_id.clone(),
                        member.user_id.clone(),
                    ));
                    downgraded.push(member.user_id.clone());
                    corrected.push(member.downgraded());
                }
                Some(Correction::Normalize) => {
                    debug!(user_id = %member.user_id, "Clearing leftovers on busy member");
                    corrected.push(member.downgraded());
                }
                None => corrected.push(member.clone()),
            }
        }

        Sweep {
            members: corrected,
            downgraded,
            pending,
        }
    }

    fn spawn_downgrade(&self, group_id: GroupId, user_id: UserId) -> JoinHandle<bool> {
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            match gateway
                .update_member_status(&group_id, &user_id, &StatusUpdate::Busy)
                .await
            {
                Ok(()) => {
                    debug!(group_id = %group_id, user_id = %user_id, "Downgrade persisted");
                    true
                }
                Err(e) => {
                    warn!(
                        group_id = %group_id,
                        user_id = %user_id,
                        error = %e,
                        "Failed to persist downgrade"
                    );
                    false
                }
            }
        })
    }
}
