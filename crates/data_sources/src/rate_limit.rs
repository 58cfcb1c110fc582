//! Request quotas for rate-limited providers.
//!
//! Free tiers are tight (Alpha Vantage allows 25 calls a day), so fetchers
//! check their quota before every request and fail fast when it is spent.
//! The cache then serves the previous payload instead.

use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A token bucket of `n` requests replenished evenly over a window.
#[derive(Debug, Clone)]
pub struct QuotaLimiter {
    limiter: Arc<DirectLimiter>,
}

impl QuotaLimiter {
    pub fn per_day(n: u32) -> Self {
        Self::spread_over(n, Duration::from_secs(86_400))
    }

    pub fn per_minute(n: u32) -> Self {
        Self::spread_over(n, Duration::from_secs(60))
    }

    pub fn per_second(n: u32) -> Self {
        Self::spread_over(n, Duration::from_secs(1))
    }

    /// Allow a burst of `n`, then one request every `window / n`.
    fn spread_over(n: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: Arc::new(GovLimiter::direct(quota)),
        }
    }

    /// Take one request slot without waiting. Returns true if acquired.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
