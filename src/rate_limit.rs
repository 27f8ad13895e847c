//! Per-caller request quota.
//!
//! The server only sees the narrow [`QuotaLimiter`] interface; [`KeyedQuota`]
//! backs it with governor's keyed GCRA limiter (lock-free, in memory).

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::config::QuotaConfig;
use crate::error::ForgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub trait QuotaLimiter: Send + Sync {
    /// Spend one unit of `key`'s budget.
    fn consume(&self, key: &str) -> Decision;

    /// Drop bookkeeping for keys whose budget is fully replenished.
    fn prune(&self) {}
}

/// `points` requests per `window` per key. Budget refills continuously, one
/// point every `window / points`; a full window of silence restores all of it.
pub struct KeyedQuota {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl KeyedQuota {
    pub fn new(config: QuotaConfig) -> Result<Self, ForgeError> {
        let points = NonZeroU32::new(config.points)
            .ok_or_else(|| ForgeError::Config("quota points must be non-zero".to_string()))?;
        let period = config.window / config.points;
        let quota = Quota::with_period(period.max(Duration::from_nanos(1)))
            .ok_or_else(|| ForgeError::Config("quota window must be non-zero".to_string()))?
            .allow_burst(points);

        Ok(Self {
            limiter: RateLimiter::keyed(quota),
        })
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

impl QuotaLimiter for KeyedQuota {
    fn consume(&self, key: &str) -> Decision {
        match self.limiter.check_key(&key.to_string()) {
            Ok(()) => Decision::Allow,
            Err(_) => Decision::Deny,
        }
    }

    fn prune(&self) {
        self.limiter.retain_recent();
    }
}

/// Never denies. Useful when an outer proxy already enforces quotas.
pub struct Unlimited;

impl QuotaLimiter for Unlimited {
    fn consume(&self, _key: &str) -> Decision {
        Decision::Allow
    }
}
