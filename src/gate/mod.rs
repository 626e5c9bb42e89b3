//! Gates in front of the AI relay and the join flow.
//!
//! - [`CooldownGate`] - one completion per interval, process-wide
//! - [`SubscriptionGate`] - membership in the forum group
//! - [`AdmissionLimiter`] - join requests per user per window
//!
//! All state is in memory and starts empty after a restart.

mod admission;
mod cooldown;
mod retry;
mod subscription;

pub use admission::AdmissionLimiter;
pub use cooldown::CooldownGate;
pub use retry::{Backoff, RetryPolicy};
pub use subscription::{DecisionReason, LookupFailure, SubscriptionDecision, SubscriptionGate};
