//! Join-request admission limiter.
//!
//! Sliding window per user id, kept in memory only. Each user's record is
//! locked independently (DashMap shards), so checks for different users never
//! wait on each other.
//!
//! The table holds at most `max_tracked_users` records. When it is full, a
//! new user triggers a sweep (at most one per window); if that frees nothing
//! the request is refused until records expire.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Per-user sliding window of join attempts.
#[derive(Clone)]
pub struct AdmissionLimiter {
    attempts: Arc<DashMap<u64, VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
    max_tracked_users: usize,
    /// Last sweep triggered by a full table.
    last_full_sweep: Arc<Mutex<Option<Instant>>>,
}

impl AdmissionLimiter {
    pub fn new(max_requests: usize, window: Duration, max_tracked_users: usize) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_requests,
            window,
            max_tracked_users: max_tracked_users.max(1),
            last_full_sweep: Arc::new(Mutex::new(None)),
        }
    }

    /// Record an attempt if the user still has budget in the trailing window.
    ///
    /// A denied attempt is not recorded. New users are refused while the
    /// table is full.
    pub fn allow(&self, user_id: u64, now: Instant) -> bool {
        if !self.attempts.contains_key(&user_id) && !self.make_room(now) {
            warn!(
                user_id,
                tracked = self.attempts.len(),
                "admission table full, refusing new user"
            );
            return false;
        }

        let mut entry = self.attempts.entry(user_id).or_default();
        prune(&mut entry, now, self.window);

        if entry.len() >= self.max_requests {
            debug!(user_id, attempts = entry.len(), "join request over the limit");
            return false;
        }

        entry.push_back(now);
        true
    }

    /// Whether a new record fits, sweeping first if the table is full.
    fn make_room(&self, now: Instant) -> bool {
        if self.attempts.len() < self.max_tracked_users {
            return true;
        }

        {
            // A full sweep locks every shard; under a flood of new ids it
            // would run on every request.
            let mut last = self.last_full_sweep.lock();
            if last.is_some_and(|at| now.saturating_duration_since(at) < self.window) {
                return false;
            }
            *last = Some(now);
        }

        let removed = self.sweep(now);
        debug!(removed, "admission table full, swept expired records");
        self.attempts.len() < self.max_tracked_users
    }

    /// Attempts recorded for the user in the window ending at `now`.
    #[cfg(test)]
    pub fn recorded(&self, user_id: u64, now: Instant) -> usize {
        self.attempts
            .get_mut(&user_id)
            .map(|mut entry| {
                prune(&mut entry, now, self.window);
                entry.len()
            })
            .unwrap_or(0)
    }

    /// Drop expired timestamps everywhere and forget users with none left.
    ///
    /// Returns how many user records were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.attempts.len();
        self.attempts.retain(|_, times| {
            prune(times, now, self.window);
            !times.is_empty()
        });
        before.saturating_sub(self.attempts.len())
    }

    /// Number of users currently tracked.
    pub fn tracked_users(&self) -> usize {
        self.attempts.len()
    }

    /// Sweep on a fixed interval until the runtime shuts down.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(limiter.window.max(Duration::from_secs(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let removed = limiter.sweep(Instant::now());
                if removed > 0 {
                    info!(
                        removed,
                        tracked = limiter.tracked_users(),
                        "swept idle join-request records"
                    );
                }
            }
        })
    }
}

fn prune(times: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = times.front() {
        if now.saturating_duration_since(oldest) > window {
            times.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(300);

    #[test]
    fn test_fourth_attempt_denied_and_not_recorded() {
        let limiter = AdmissionLimiter::new(3, WINDOW, 100);
        let t0 = Instant::now();

        assert!(limiter.allow(7, t0));
        assert!(limiter.allow(7, t0 + Duration::from_secs(10)));
        assert!(limiter.allow(7, t0 + Duration::from_secs(20)));
        assert!(!limiter.allow(7, t0 + Duration::from_secs(30)));

        assert_eq!(limiter.recorded(7, t0 + Duration::from_secs(30)), 3);
    }

    #[test]
    fn test_window_slides() {
        let limiter = AdmissionLimiter::new(3, WINDOW, 100);
        let t0 = Instant::now();

        for i in 0..3 {
            assert!(limiter.allow(7, t0 + Duration::from_secs(i)));
        }

        // Only timestamps strictly older than the window are dropped.
        assert!(!limiter.allow(7, t0 + WINDOW));
        assert!(limiter.allow(7, t0 + WINDOW + Duration::from_millis(1)));
        assert!(!limiter.allow(7, t0 + WINDOW + Duration::from_millis(1)));
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = AdmissionLimiter::new(1, WINDOW, 100);
        let now = Instant::now();

        assert!(limiter.allow(1, now));
        assert!(!limiter.allow(1, now));
        assert!(limiter.allow(2, now));
    }

    #[test]
    fn test_sweep_forgets_idle_users() {
        let limiter = AdmissionLimiter::new(3, WINDOW, 100);
        let t0 = Instant::now();

        limiter.allow(1, t0);
        limiter.allow(2, t0 + Duration::from_secs(200));

        let removed = limiter.sweep(t0 + Duration::from_secs(301));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_users(), 1);
    }

    #[test]
    fn test_full_table_triggers_sweep() {
        let limiter = AdmissionLimiter::new(3, WINDOW, 2);
        let t0 = Instant::now();

        limiter.allow(1, t0);
        limiter.allow(2, t0);

        // Both old records expired, so a new user finds room.
        assert!(limiter.allow(3, t0 + WINDOW + Duration::from_secs(1)));
        assert_eq!(limiter.tracked_users(), 1);
    }

    #[test]
    fn test_table_never_exceeds_capacity() {
        let limiter = AdmissionLimiter::new(3, WINDOW, 2);
        let now = Instant::now();

        let admitted = (0..100).filter(|&user| limiter.allow(user, now)).count();

        assert_eq!(admitted, 2);
        assert!(limiter.tracked_users() <= 2);
        // Users already tracked keep their budget.
        assert!(limiter.allow(0, now));
    }

    #[test]
    fn test_full_table_sweeps_at_most_once_per_window() {
        let limiter = AdmissionLimiter::new(3, WINDOW, 1);
        let t0 = Instant::now();

        assert!(limiter.allow(1, t0));
        // Full, nothing expired yet: this sweep frees nothing.
        assert!(!limiter.allow(2, t0 + Duration::from_secs(10)));

        // User 1 has expired, but the last full-table sweep was too recent.
        let later = t0 + WINDOW + Duration::from_secs(1);
        assert!(!limiter.allow(3, later));
        assert_eq!(limiter.tracked_users(), 1);

        // A window after that sweep, the table is swept again.
        assert!(limiter.allow(3, t0 + Duration::from_secs(10) + WINDOW));
        assert_eq!(limiter.tracked_users(), 1);
    }
}
