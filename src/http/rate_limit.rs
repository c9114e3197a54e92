//! Rate limiting implementation
//!
//! A budget is `max_requests` per `window`. The governor crate's GCRA bucket
//! spaces requests out (one cell every `window / max_requests`, at most
//! `burst_size` back to back), and a log of recent grant times caps any
//! window-length interval at `max_requests` grants.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per window
    pub max_requests: u32,
    /// Length of the budget window
    #[serde(with = "duration_secs", rename = "window_secs")]
    pub window: Duration,
    /// Burst size (max tokens in bucket), clamped to `max_requests`
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::github()
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(max_requests: u32, window: Duration, burst_size: u32) -> Self {
        Self {
            max_requests,
            window,
            burst_size,
        }
    }

    /// GitHub REST budget for an authenticated user (5000 per hour)
    pub fn github() -> Self {
        Self {
            max_requests: 5000,
            window: Duration::from_secs(3600),
            burst_size: 1,
        }
    }

    /// Requests per hour
    pub fn per_hour(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(3600),
            burst_size: 1,
        }
    }

    /// Interval between replenished cells
    pub fn replenish_interval(&self) -> Duration {
        let max = self.max_requests.max(1);
        let interval = self.window / max;
        if interval.is_zero() {
            Duration::from_nanos(1)
        } else {
            interval
        }
    }

    fn quota(&self) -> Quota {
        let one = NonZeroU32::MIN;
        let burst = NonZeroU32::new(self.burst_size.min(self.max_requests)).unwrap_or(one);
        Quota::with_period(self.replenish_interval())
            .unwrap_or_else(|| Quota::per_second(one))
            .allow_burst(burst)
    }
}

/// Rate limiter bounding requests per window
///
/// Cloning yields another handle onto the same budget, so one instance can be
/// shared by every in-flight page fetch of a run.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
    /// Grant times still inside the window, oldest first
    grants: Arc<Mutex<VecDeque<Instant>>>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            limiter: Arc::new(Governor::direct(config.quota())),
            grants: Arc::new(Mutex::new(VecDeque::new())),
            config: config.clone(),
        }
    }

    /// Wait until a request can be made. Never fails, only delays.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
        while let Some(wait) = self.reserve(Instant::now()) {
            tokio::time::sleep(wait).await;
        }
    }

    /// Try to acquire a permit, returning immediately
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut grants = self.lock_grants();
        self.prune(&mut grants, now);
        if grants.len() >= self.capacity() || self.limiter.check().is_err() {
            return false;
        }
        grants.push_back(now);
        true
    }

    /// Wait with a timeout; `false` if no permit was granted in time
    pub async fn acquire_with_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.acquire()).await.is_ok()
    }

    /// Configuration this limiter was built from
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn capacity(&self) -> usize {
        self.config.max_requests.max(1) as usize
    }

    fn lock_grants(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.grants.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a grant at `now`, or return how long until the oldest one
    /// leaves the window
    fn reserve(&self, now: Instant) -> Option<Duration> {
        let mut grants = self.lock_grants();
        self.prune(&mut grants, now);
        if grants.len() < self.capacity() {
            grants.push_back(now);
            return None;
        }
        grants
            .front()
            .map(|oldest| self.config.window.saturating_sub(now.duration_since(*oldest)))
    }

    fn prune(&self, grants: &mut VecDeque<Instant>, now: Instant) {
        while grants
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.config.window)
        {
            grants.pop_front();
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
