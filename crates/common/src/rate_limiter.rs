//! Sliding-window admission control
//!
//! Each `(action kind, key)` pair owns a queue of the instants at which it was
//! admitted. A check drops instants strictly older than the window from the
//! front, denies (without recording anything) when the queue is full, and
//! otherwise records `now` and admits.
//!
//! Policies are per action kind. Kinds without a policy are never limited.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Action kind used for login attempts
pub const LOGIN: &str = "login";

/// At most `limit` admissions per `window_secs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePolicy {
    pub limit: usize,
    pub window_secs: u64,
}

impl RatePolicy {
    pub fn new(limit: usize, window_secs: u64) -> Self {
        Self { limit, window_secs }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    policies: HashMap<String, RatePolicy>,
    buckets: Mutex<HashMap<(String, String), VecDeque<Instant>>>,
}

impl Default for RateLimiter {
    /// `login` limited to 5 attempts per 60 seconds
    fn default() -> Self {
        Self::new().with_policy(LOGIN, RatePolicy::new(5, 60))
    }
}

impl RateLimiter {
    /// A limiter with no policies at all
    pub fn new() -> Self {
        Self {
            policies: HashMap::new(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Set (or replace) the policy for `kind`
    pub fn with_policy(mut self, kind: impl Into<String>, policy: RatePolicy) -> Self {
        self.policies.insert(kind.into(), policy);
        self
    }

    pub fn policy(&self, kind: &str) -> Option<&RatePolicy> {
        self.policies.get(kind)
    }

    /// Try to admit one `kind` action for `key`
    pub fn check(&self, kind: &str, key: &str) -> bool {
        self.check_at(kind, key, Instant::now())
    }

    /// [`check`](Self::check) against an explicit clock
    pub fn check_at(&self, kind: &str, key: &str, now: Instant) -> bool {
        let Some(policy) = self.policies.get(kind) else {
            return true;
        };
        let window = policy.window();

        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry((kind.to_string(), key.to_string()))
            .or_default();
        while let Some(oldest) = bucket.front() {
            if now.saturating_duration_since(*oldest) > window {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if bucket.len() >= policy.limit {
            return false;
        }
        bucket.push_back(now);
        true
    }

    /// Drop buckets whose every entry has aged out. Returns how many went.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    pub fn prune_at(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|(kind, _), bucket| {
            let Some(policy) = self.policies.get(kind) else {
                return false;
            };
            let window = policy.window();
            bucket.retain(|at| now.saturating_duration_since(*at) <= window);
            !bucket.is_empty()
        });
        before - buckets.len()
    }

    /// Number of live buckets
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
