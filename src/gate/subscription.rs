//! Membership-based access check for the AI relay.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::retry::{RetryPolicy, retry};
use crate::cache::TypedCache;
use crate::config::SubscriptionTarget;
use crate::membership::MemberStatus;
use crate::services::{LookupError, MembershipLookup};

/// Which kind of lookup failure closed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailure {
    /// The bot cannot read members of the target group.
    Permission,
    Timeout,
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    Ok,
    NotMember,
    LookupFailed(LookupFailure),
    /// Target id is malformed or does not point at a reachable chat.
    Misconfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
}

impl SubscriptionDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::Ok,
        }
    }

    fn deny(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

impl From<LookupError> for DecisionReason {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::PermissionDenied(_) => Self::LookupFailed(LookupFailure::Permission),
            LookupError::Timeout(_) => Self::LookupFailed(LookupFailure::Timeout),
            LookupError::Transient(_) => Self::LookupFailed(LookupFailure::Transient),
            LookupError::NotFound(_) => Self::Misconfigured,
        }
    }
}

/// Decides whether a user may use the gated feature.
///
/// An unset target disables the gate entirely. That is a configuration
/// fallback for deployments without a forum, not an access policy.
#[derive(Clone)]
pub struct SubscriptionGate {
    lookup: Arc<dyn MembershipLookup>,
    target: SubscriptionTarget,
    retry: RetryPolicy,
    timeout: Duration,
    /// Only positive statuses land here.
    cache: TypedCache<(i64, u64), MemberStatus>,
}

impl SubscriptionGate {
    pub fn new(
        lookup: Arc<dyn MembershipLookup>,
        target: SubscriptionTarget,
        retry: RetryPolicy,
        timeout: Duration,
        cache: TypedCache<(i64, u64), MemberStatus>,
    ) -> Self {
        Self {
            lookup,
            target,
            retry,
            timeout,
            cache,
        }
    }

    pub fn target(&self) -> &SubscriptionTarget {
        &self.target
    }

    /// Check `user_id` against the configured target group.
    ///
    /// `origin_chat` is the chat the request came from; requests made inside
    /// the target group skip the lookup.
    pub async fn check(&self, user_id: u64, origin_chat: i64) -> SubscriptionDecision {
        let target = match &self.target {
            SubscriptionTarget::Disabled => return SubscriptionDecision::allow(),
            SubscriptionTarget::Invalid(raw) => {
                warn!(target_chat = %raw, "subscription target is not a chat id");
                return SubscriptionDecision::deny(DecisionReason::Misconfigured);
            }
            SubscriptionTarget::Chat(id) => *id,
        };

        if origin_chat == target {
            return SubscriptionDecision::allow();
        }

        if let Some(status) = self.cache.get(&(target, user_id)) {
            debug!(user_id, %status, "membership cache hit");
            return SubscriptionDecision::allow();
        }

        let result = retry(&self.retry, "get_chat_member", LookupError::is_retryable, || {
            self.lookup_once(target, user_id)
        })
        .await;

        match result {
            Ok(status) if status.is_allowed() => {
                self.cache.insert((target, user_id), status);
                SubscriptionDecision::allow()
            }
            Ok(status) => {
                debug!(user_id, %status, "user is not subscribed");
                SubscriptionDecision::deny(DecisionReason::NotMember)
            }
            Err(error) => {
                warn!(user_id, target_chat = target, error = %error, "membership lookup failed");
                SubscriptionDecision::deny(error.into())
            }
        }
    }

    async fn lookup_once(&self, target: i64, user_id: u64) -> Result<MemberStatus, LookupError> {
        match tokio::time::timeout(self.timeout, self.lookup.get_status(target, user_id)).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::gate::Backoff;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FORUM: i64 = -100_123;

    /// Replays scripted answers; repeats the last one when the script runs out.
    struct ScriptedLookup {
        script: Mutex<VecDeque<Result<MemberStatus, LookupError>>>,
        last: Mutex<Option<Result<MemberStatus, LookupError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedLookup {
        fn new(script: Vec<Result<MemberStatus, LookupError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MembershipLookup for ScriptedLookup {
        async fn get_status(&self, _chat_id: i64, _user_id: u64) -> Result<MemberStatus, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            match next {
                Some(answer) => {
                    *self.last.lock() = Some(answer.clone());
                    answer
                }
                None => self
                    .last
                    .lock()
                    .clone()
                    .unwrap_or(Err(LookupError::Transient("empty script".into()))),
            }
        }
    }

    struct HangingLookup;

    #[async_trait]
    impl MembershipLookup for HangingLookup {
        async fn get_status(&self, _chat_id: i64, _user_id: u64) -> Result<MemberStatus, LookupError> {
            std::future::pending().await
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            backoff: Backoff::Fixed(Duration::from_secs(1)),
        }
    }

    fn gate(lookup: Arc<dyn MembershipLookup>, target: SubscriptionTarget) -> SubscriptionGate {
        SubscriptionGate::new(
            lookup,
            target,
            policy(),
            Duration::from_secs(15),
            TypedCache::new("membership", CacheConfig::membership()),
        )
    }

    #[tokio::test]
    async fn test_disabled_target_allows_without_lookup() {
        let lookup = ScriptedLookup::new(vec![Ok(MemberStatus::Left)]);
        let gate = gate(lookup.clone(), SubscriptionTarget::Disabled);

        let decision = gate.check(42, 42).await;

        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Ok);
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_is_retried_then_fails_closed() {
        let lookup = ScriptedLookup::new(vec![
            Err(LookupError::PermissionDenied("not enough rights".into())),
            Err(LookupError::PermissionDenied("not enough rights".into())),
        ]);
        let gate = gate(lookup.clone(), SubscriptionTarget::Chat(FORUM));

        let decision = gate.check(42, 42).await;

        assert!(!decision.allowed);
        assert_eq!(
            decision.reason,
            DecisionReason::LookupFailed(LookupFailure::Permission)
        );
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let lookup = ScriptedLookup::new(vec![Err(LookupError::NotFound("chat not found".into()))]);
        let gate = gate(lookup.clone(), SubscriptionTarget::Chat(FORUM));

        let decision = gate.check(42, 42).await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Misconfigured);
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_target_fails_closed() {
        let lookup = ScriptedLookup::new(vec![Ok(MemberStatus::Member)]);
        let gate = gate(lookup.clone(), SubscriptionTarget::Invalid("@forum".into()));

        let decision = gate.check(42, 42).await;

        assert_eq!(decision.reason, DecisionReason::Misconfigured);
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test]
    async fn test_request_from_target_chat_skips_lookup() {
        let lookup = ScriptedLookup::new(vec![Ok(MemberStatus::Left)]);
        let gate = gate(lookup.clone(), SubscriptionTarget::Chat(FORUM));

        assert!(gate.check(42, FORUM).await.allowed);
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_member() {
        let lookup = ScriptedLookup::new(vec![
            Err(LookupError::Transient("connection reset".into())),
            Ok(MemberStatus::Member),
        ]);
        let gate = gate(lookup.clone(), SubscriptionTarget::Chat(FORUM));

        assert!(gate.check(42, 42).await.allowed);
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test]
    async fn test_only_positive_statuses_are_cached() {
        let lookup = ScriptedLookup::new(vec![
            Ok(MemberStatus::Left),
            Ok(MemberStatus::Administrator),
        ]);
        let gate = gate(lookup.clone(), SubscriptionTarget::Chat(FORUM));

        let first = gate.check(42, 42).await;
        assert_eq!(first.reason, DecisionReason::NotMember);

        assert!(gate.check(42, 42).await.allowed);
        assert!(gate.check(42, 42).await.allowed);
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test]
    async fn test_restricted_and_banned_are_denied() {
        for status in [MemberStatus::Restricted, MemberStatus::Banned] {
            let lookup = ScriptedLookup::new(vec![Ok(status)]);
            let gate = gate(lookup, SubscriptionTarget::Chat(FORUM));
            assert_eq!(gate.check(42, 42).await.reason, DecisionReason::NotMember);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_lookup_times_out() {
        let gate = gate(Arc::new(HangingLookup), SubscriptionTarget::Chat(FORUM));

        let decision = gate.check(42, 42).await;

        assert_eq!(
            decision.reason,
            DecisionReason::LookupFailed(LookupFailure::Timeout)
        );
    }
}
