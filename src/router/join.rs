//! Join-request flow: admission limiter, then approve or decline.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::gate::AdmissionLimiter;
use crate::services::{ApprovalError, JoinApproval};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Approved,
    /// Over the limit. `declined` is false when the decline call itself failed.
    Throttled { declined: bool },
    ApprovalFailed(ApprovalError),
}

#[derive(Clone)]
pub struct JoinFlow {
    limiter: AdmissionLimiter,
    approval: Arc<dyn JoinApproval>,
}

impl JoinFlow {
    pub fn new(limiter: AdmissionLimiter, approval: Arc<dyn JoinApproval>) -> Self {
        Self { limiter, approval }
    }

    pub fn limiter(&self) -> &AdmissionLimiter {
        &self.limiter
    }

    pub async fn handle(&self, chat_id: i64, user_id: u64) -> JoinOutcome {
        self.handle_at(chat_id, user_id, Instant::now()).await
    }

    /// Notifications are the caller's job; this only settles the request.
    pub async fn handle_at(&self, chat_id: i64, user_id: u64, now: Instant) -> JoinOutcome {
        if !self.limiter.allow(user_id, now) {
            let declined = match self.approval.decline(chat_id, user_id).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(chat_id, user_id, error = %err, "failed to decline throttled join request");
                    false
                }
            };
            info!(chat_id, user_id, declined, "join request throttled");
            return JoinOutcome::Throttled { declined };
        }

        match self.approval.approve(chat_id, user_id).await {
            Ok(()) => {
                info!(chat_id, user_id, "join request approved");
                JoinOutcome::Approved
            }
            Err(err) => {
                warn!(chat_id, user_id, error = %err, "failed to approve join request");
                JoinOutcome::ApprovalFailed(err)
            }
        }
    }
}
