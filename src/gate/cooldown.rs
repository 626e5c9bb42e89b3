//! Process-wide cooldown between successful AI completions.
//!
//! One timestamp, shared by every user. A slot is reserved by
//! [`CooldownGate::try_acquire`] and only turns into a cooldown when the
//! holder reports success; a failed call simply releases the slot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct CooldownState {
    last_success_at: Option<Instant>,
    in_flight: bool,
}

/// Returned when a call must not go out yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitHint {
    pub remaining: Duration,
}

impl WaitHint {
    /// Whole seconds to show the user, rounded up so it never reads "0".
    pub fn remaining_secs(&self) -> u64 {
        let secs = self.remaining.as_secs();
        if self.remaining.subsec_nanos() > 0 || secs == 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Global single-slot throttle.
#[derive(Clone)]
pub struct CooldownGate {
    state: Arc<Mutex<CooldownState>>,
    min_interval: Duration,
}

impl CooldownGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CooldownState::default())),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Reserve the slot, or learn how long to wait.
    ///
    /// Checking and reserving happen under one lock, so concurrent callers
    /// cannot both be granted.
    pub fn try_acquire(&self, now: Instant) -> Result<Permit, WaitHint> {
        let mut state = self.state.lock();

        if state.in_flight {
            debug!("cooldown slot busy, call already in flight");
            return Err(WaitHint {
                remaining: self.min_interval,
            });
        }

        if let Some(last) = state.last_success_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.min_interval {
                return Err(WaitHint {
                    remaining: self.min_interval - elapsed,
                });
            }
        }

        state.in_flight = true;
        Ok(Permit {
            state: Arc::clone(&self.state),
            released: false,
        })
    }

    /// Time of the last recorded success, if any.
    #[cfg(test)]
    pub fn last_success(&self) -> Option<Instant> {
        self.state.lock().last_success_at
    }
}

/// Reservation of the cooldown slot.
///
/// Dropping it without [`Permit::record_success`] frees the slot and leaves
/// the cooldown untouched.
#[must_use = "dropping a permit releases the slot immediately"]
pub struct Permit {
    state: Arc<Mutex<CooldownState>>,
    released: bool,
}

impl Permit {
    /// The guarded call succeeded: start the cooldown at `now`.
    pub fn record_success(mut self, now: Instant) {
        let mut state = self.state.lock();
        // Never move the timestamp backwards.
        state.last_success_at = Some(match state.last_success_at {
            Some(last) if last > now => last,
            _ => now,
        });
        state.in_flight = false;
        self.released = true;
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.released {
            self.state.lock().in_flight = false;
        }
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").field("released", &self.released).finish()
    }
}
