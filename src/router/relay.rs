//! AI chat relay: subscription gate, then cooldown, then the completion call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::ChatEvent;
use crate::gate::{CooldownGate, SubscriptionDecision, SubscriptionGate};
use crate::services::{CompletionError, TextCompletion};

/// What the handler should tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Reply(String),
    /// Cooldown active; come back in this many seconds.
    Wait { remaining_secs: u64 },
    Denied(SubscriptionDecision),
    Failed(CompletionError),
    /// No backend configured, or the backend rejected our credentials earlier.
    Unavailable,
}

#[derive(Clone)]
pub struct ChatRelay {
    subscription: SubscriptionGate,
    cooldown: CooldownGate,
    completion: Option<Arc<dyn TextCompletion>>,
    /// Set after an auth failure; credentials do not fix themselves at runtime.
    disabled: Arc<AtomicBool>,
    system_prompt: Arc<str>,
    timeout: Duration,
}

impl ChatRelay {
    pub fn new(
        subscription: SubscriptionGate,
        cooldown: CooldownGate,
        completion: Option<Arc<dyn TextCompletion>>,
        system_prompt: impl Into<Arc<str>>,
        timeout: Duration,
    ) -> Self {
        Self {
            subscription,
            cooldown,
            completion,
            disabled: Arc::new(AtomicBool::new(false)),
            system_prompt: system_prompt.into(),
            timeout,
        }
    }

    pub fn is_available(&self) -> bool {
        self.completion.is_some() && !self.disabled.load(Ordering::Relaxed)
    }

    pub fn cooldown(&self) -> &CooldownGate {
        &self.cooldown
    }

    /// Events without text are answered with [`RelayOutcome::Unavailable`].
    pub async fn handle(&self, event: &ChatEvent, check_subscription: bool) -> RelayOutcome {
        self.handle_with_clock(event, check_subscription, Instant::now).await
    }

    /// Run the chain as if every clock read returned `now`.
    #[cfg(test)]
    pub async fn handle_at(&self, event: &ChatEvent, check_subscription: bool, now: Instant) -> RelayOutcome {
        self.handle_with_clock(event, check_subscription, || now).await
    }

    /// Run the chain. `clock` is read once, after the subscription gate and
    /// right before the cooldown check; that reading is the call time
    /// recorded on success.
    pub async fn handle_with_clock<C>(&self, event: &ChatEvent, check_subscription: bool, clock: C) -> RelayOutcome
    where
        C: Fn() -> Instant,
    {
        let completion = match &self.completion {
            Some(completion) if !self.disabled.load(Ordering::Relaxed) => completion,
            _ => return RelayOutcome::Unavailable,
        };

        let prompt = match event.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => return RelayOutcome::Unavailable,
        };

        if check_subscription {
            let decision = self.subscription.check(event.user_id, event.chat_id).await;
            if !decision.allowed {
                debug!(user_id = event.user_id, reason = ?decision.reason, "relay denied by subscription gate");
                return RelayOutcome::Denied(decision);
            }
        }

        // The lookup above may take several seconds.
        let now = clock();
        let permit = match self.cooldown.try_acquire(now) {
            Ok(permit) => permit,
            Err(hint) => {
                return RelayOutcome::Wait {
                    remaining_secs: hint.remaining_secs(),
                };
            }
        };

        let call = completion.complete(prompt, &self.system_prompt);
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(self.timeout)),
        };

        match result {
            Ok(reply) => {
                permit.record_success(now);
                info!(
                    user_id = event.user_id,
                    chat_id = event.chat_id,
                    thread_id = ?event.thread_id,
                    "relayed AI reply"
                );
                RelayOutcome::Reply(reply)
            }
            Err(err) => {
                // Dropping the permit frees the slot without starting a cooldown.
                drop(permit);
                if let CompletionError::AuthFailed(_) = &err {
                    error!(error = %err, "completion backend rejected credentials, disabling AI relay");
                    self.disabled.store(true, Ordering::Relaxed);
                } else {
                    warn!(user_id = event.user_id, error = %err, "completion failed");
                }
                RelayOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, TypedCache};
    use crate::config::SubscriptionTarget;
    use crate::gate::{DecisionReason, RetryPolicy};
    use crate::membership::MemberStatus;
    use crate::router::{EventKind, Route, RouterPolicy, route};
    use crate::services::{LookupError, MembershipLookup};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    const FORUM: i64 = -100_777;
    const MIN_INTERVAL: Duration = Duration::from_secs(60);

    struct FixedLookup(MemberStatus);

    #[async_trait]
    impl MembershipLookup for FixedLookup {
        async fn get_status(&self, _chat_id: i64, _user_id: u64) -> Result<MemberStatus, LookupError> {
            Ok(self.0)
        }
    }

    struct FakeCompletion {
        answers: Mutex<Vec<Result<String, CompletionError>>>,
        calls: AtomicUsize,
    }

    impl FakeCompletion {
        /// Answers are consumed front to back, then every prompt is echoed.
        fn new(answers: Vec<Result<String, CompletionError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextCompletion for FakeCompletion {
        async fn complete(&self, prompt: &str, _system: &str) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .pop()
                .unwrap_or_else(|| Ok(format!("re: {prompt}")))
        }
    }

    fn relay(status: MemberStatus, completion: Arc<FakeCompletion>) -> ChatRelay {
        let subscription = SubscriptionGate::new(
            Arc::new(FixedLookup(status)),
            SubscriptionTarget::Chat(FORUM),
            RetryPolicy::default(),
            Duration::from_secs(15),
            TypedCache::new("membership", CacheConfig::membership()),
        );
        ChatRelay::new(
            subscription,
            CooldownGate::new(MIN_INTERVAL),
            Some(completion as Arc<dyn TextCompletion>),
            "be brief",
            Duration::from_secs(30),
        )
    }

    fn private(text: &str) -> ChatEvent {
        ChatEvent {
            kind: EventKind::PrivateMessage,
            user_id: 42,
            chat_id: 42,
            text: Some(text.to_string()),
            thread_id: None,
        }
    }

    fn group(text: &str) -> ChatEvent {
        ChatEvent {
            kind: EventKind::GroupMessage,
            user_id: 43,
            chat_id: -100_200,
            text: Some(text.to_string()),
            thread_id: Some(12),
        }
    }

    fn policy() -> RouterPolicy {
        RouterPolicy {
            trigger_keyword: "ало".to_string(),
            check_subscription_in_groups: false,
        }
    }

    #[tokio::test]
    async fn test_private_message_from_admin_is_relayed() {
        let completion = FakeCompletion::new(vec![Ok("Привіт!".to_string())]);
        let relay = relay(MemberStatus::Administrator, completion.clone());
        let event = private("hello");
        let now = Instant::now();

        let Route::AiChat { check_subscription } = route(&event, &policy()) else {
            panic!("private text should be routed to the relay");
        };
        let outcome = relay.handle_at(&event, check_subscription, now).await;

        assert_eq!(outcome, RelayOutcome::Reply("Привіт!".to_string()));
        assert_eq!(completion.calls(), 1);
        assert_eq!(relay.cooldown().last_success(), Some(now));
    }

    #[tokio::test]
    async fn test_group_keyword_during_cooldown_gets_wait() {
        let completion = FakeCompletion::new(vec![]);
        let relay = relay(MemberStatus::Member, completion.clone());
        let start = Instant::now();

        let first = relay.handle_at(&private("hello"), true, start).await;
        assert!(matches!(first, RelayOutcome::Reply(_)));

        let event = group("хтось казав ало?");
        let Route::AiChat { check_subscription } = route(&event, &policy()) else {
            panic!("keyword should trigger the relay");
        };
        let outcome = relay
            .handle_at(&event, check_subscription, start + Duration::from_secs(15))
            .await;

        assert_eq!(outcome, RelayOutcome::Wait { remaining_secs: 45 });
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_call_does_not_start_cooldown() {
        let completion = FakeCompletion::new(vec![Err(CompletionError::RateLimited)]);
        let relay = relay(MemberStatus::Member, completion.clone());
        let now = Instant::now();

        let failed = relay.handle_at(&private("hello"), true, now).await;
        assert_eq!(failed, RelayOutcome::Failed(CompletionError::RateLimited));
        assert_eq!(relay.cooldown().last_success(), None);

        let retried = relay.handle_at(&private("hello"), true, now).await;
        assert_eq!(retried, RelayOutcome::Reply("re: hello".to_string()));
        assert_eq!(completion.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_member_is_denied_without_ai_call() {
        let completion = FakeCompletion::new(vec![]);
        let relay = relay(MemberStatus::Left, completion.clone());

        let outcome = relay.handle_at(&private("hello"), true, Instant::now()).await;

        let RelayOutcome::Denied(decision) = outcome else {
            panic!("expected a denial, got {outcome:?}");
        };
        assert_eq!(decision.reason, DecisionReason::NotMember);
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_disables_relay() {
        let completion = FakeCompletion::new(vec![Err(CompletionError::AuthFailed("bad key".into()))]);
        let relay = relay(MemberStatus::Member, completion.clone());
        let now = Instant::now();

        let first = relay.handle_at(&private("hello"), true, now).await;
        assert!(matches!(first, RelayOutcome::Failed(CompletionError::AuthFailed(_))));
        assert!(!relay.is_available());

        let second = relay.handle_at(&private("hello"), true, now).await;
        assert_eq!(second, RelayOutcome::Unavailable);
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_relay_without_backend_is_unavailable() {
        let subscription = SubscriptionGate::new(
            Arc::new(FixedLookup(MemberStatus::Member)),
            SubscriptionTarget::Disabled,
            RetryPolicy::default(),
            Duration::from_secs(15),
            TypedCache::new("membership", CacheConfig::membership()),
        );
        let relay = ChatRelay::new(
            subscription,
            CooldownGate::new(MIN_INTERVAL),
            None,
            "",
            Duration::from_secs(30),
        );

        assert_eq!(
            relay.handle_at(&private("hello"), true, Instant::now()).await,
            RelayOutcome::Unavailable
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_starts_at_call_time_after_slow_lookup() {
        struct SlowLookup;

        #[async_trait]
        impl MembershipLookup for SlowLookup {
            async fn get_status(&self, _chat_id: i64, _user_id: u64) -> Result<MemberStatus, LookupError> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(MemberStatus::Member)
            }
        }

        let completion = FakeCompletion::new(vec![]);
        let subscription = SubscriptionGate::new(
            Arc::new(SlowLookup),
            SubscriptionTarget::Chat(FORUM),
            RetryPolicy::default(),
            Duration::from_secs(15),
            TypedCache::new("membership", CacheConfig::membership()),
        );
        let relay = ChatRelay::new(
            subscription,
            CooldownGate::new(MIN_INTERVAL),
            Some(completion.clone() as Arc<dyn TextCompletion>),
            "",
            Duration::from_secs(30),
        );
        let clock = || tokio::time::Instant::now().into_std();
        let arrived = clock();

        let first = relay.handle_with_clock(&private("hello"), true, clock).await;
        assert!(matches!(first, RelayOutcome::Reply(_)));
        let called = relay.cooldown().last_success().unwrap();
        assert!(called >= arrived + Duration::from_secs(10));
        assert!(called < arrived + Duration::from_secs(11));

        // 65 s after the first event arrived, but only 55 s after the AI call.
        tokio::time::advance(Duration::from_secs(55)).await;
        let second = relay.handle_with_clock(&group("ало"), false, clock).await;

        assert_eq!(second, RelayOutcome::Wait { remaining_secs: 5 });
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        struct Stalled;

        #[async_trait]
        impl TextCompletion for Stalled {
            async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, CompletionError> {
                std::future::pending().await
            }
        }

        let subscription = SubscriptionGate::new(
            Arc::new(FixedLookup(MemberStatus::Member)),
            SubscriptionTarget::Disabled,
            RetryPolicy::default(),
            Duration::from_secs(15),
            TypedCache::new("membership", CacheConfig::membership()),
        );
        let relay = ChatRelay::new(
            subscription,
            CooldownGate::new(MIN_INTERVAL),
            Some(Arc::new(Stalled) as Arc<dyn TextCompletion>),
            "",
            Duration::from_secs(30),
        );

        let outcome = relay.handle_at(&private("hello"), true, Instant::now()).await;

        assert_eq!(
            outcome,
            RelayOutcome::Failed(CompletionError::Timeout(Duration::from_secs(30)))
        );
        assert_eq!(relay.cooldown().last_success(), None);
    }
}
