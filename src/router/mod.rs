//! Message routing: which chain, if any, handles an inbound event.
//!
//! ## Chains
//!
//! - [`ChatRelay`] - subscription gate, cooldown gate, then the completion call
//! - [`JoinFlow`] - admission limiter, then approve or decline
//!
//! [`route`] is a pure function over a [`ChatEvent`]; the handlers in
//! `events` build the event from a Telegram update and run the chosen chain.

mod join;
mod relay;

pub use join::{JoinFlow, JoinOutcome};
pub use relay::{ChatRelay, RelayOutcome};

/// Kind of inbound update, as far as routing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PrivateMessage,
    GroupMessage,
    JoinRequest,
    Callback,
}

/// Read-only view of an inbound update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub kind: EventKind,
    pub user_id: u64,
    pub chat_id: i64,
    pub text: Option<String>,
    pub thread_id: Option<i32>,
}

impl ChatEvent {
    fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Routing knobs that come from configuration.
#[derive(Debug, Clone)]
pub struct RouterPolicy {
    pub trigger_keyword: String,
    /// Whether keyword-triggered group messages go through the subscription gate.
    pub check_subscription_in_groups: bool,
}

impl RouterPolicy {
    fn mentions_trigger(&self, text: &str) -> bool {
        let keyword = self.trigger_keyword.trim().to_lowercase();
        !keyword.is_empty() && text.to_lowercase().contains(&keyword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    AiChat { check_subscription: bool },
    Join,
    Ignore,
}

/// Pick the chain for an event. Each event takes exactly one branch.
pub fn route(event: &ChatEvent, policy: &RouterPolicy) -> Route {
    let text = event.text().trim();
    let is_command = text.starts_with('/');

    match event.kind {
        EventKind::PrivateMessage if !text.is_empty() && !is_command => Route::AiChat {
            check_subscription: true,
        },
        EventKind::GroupMessage if !is_command && policy.mentions_trigger(text) => Route::AiChat {
            check_subscription: policy.check_subscription_in_groups,
        },
        EventKind::JoinRequest => Route::Join,
        _ => Route::Ignore,
    }
}
