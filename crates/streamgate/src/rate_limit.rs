//! Per-address rate limiting for the unauthenticated hot spots.
//!
//! Login and playback start are the two endpoints a client can hammer
//! without holding a session. Each gets a keyed token bucket from
//! `governor`, keyed by the caller's IP address.

use std::net::IpAddr;
use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::ApiError;

/// Requests allowed per caller address per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Default: 20.
    pub login_per_minute: u32,
    /// Default: 30.
    pub playback_start_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_per_minute: 20,
            playback_start_per_minute: 30,
        }
    }
}

/// Which endpoint a request counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Login,
    PlaybackStart,
}

/// The keyed limiters, one per [`Bucket`].
pub struct RateLimits {
    login: DefaultKeyedRateLimiter<IpAddr>,
    playback_start: DefaultKeyedRateLimiter<IpAddr>,
}

impl RateLimits {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            login: RateLimiter::keyed(per_minute(config.login_per_minute)),
            playback_start: RateLimiter::keyed(per_minute(config.playback_start_per_minute)),
        }
    }

    /// Spends one request from `ip`'s budget in `bucket`.
    ///
    /// # Errors
    /// [`ApiError::RateLimited`] when the budget is exhausted.
    pub fn check(&self, bucket: Bucket, ip: IpAddr) -> Result<(), ApiError> {
        let limiter = match bucket {
            Bucket::Login => &self.login,
            Bucket::PlaybackStart => &self.playback_start,
        };
        limiter.check_key(&ip).map_err(|_| {
            tracing::warn!(%ip, ?bucket, "rate limit exceeded");
            ApiError::RateLimited
        })
    }

    /// Forgets addresses whose budget has fully refilled. They are
    /// indistinguishable from addresses never seen, so nothing is lost.
    pub fn retain_recent(&self) {
        for limiter in [&self.login, &self.playback_start] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }
}

/// A zero limit is clamped to one request per minute.
fn per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_check_exhausted_budget_returns_rate_limited() {
        let limits = RateLimits::new(RateLimitConfig {
            login_per_minute: 2,
            playback_start_per_minute: 2,
        });

        assert!(limits.check(Bucket::Login, ip(1)).is_ok());
        assert!(limits.check(Bucket::Login, ip(1)).is_ok());

        assert!(matches!(
            limits.check(Bucket::Login, ip(1)),
            Err(ApiError::RateLimited)
        ));
    }

    #[test]
    fn test_check_addresses_have_separate_budgets() {
        let limits = RateLimits::new(RateLimitConfig {
            login_per_minute: 1,
            playback_start_per_minute: 1,
        });

        assert!(limits.check(Bucket::Login, ip(1)).is_ok());
        assert!(limits.check(Bucket::Login, ip(2)).is_ok());
        assert!(limits.check(Bucket::Login, ip(1)).is_err());
    }

    #[test]
    fn test_retain_recent_drops_refilled_addresses() {
        // 60k/min refills one request per millisecond.
        let limits = RateLimits::new(RateLimitConfig {
            login_per_minute: 60_000,
            playback_start_per_minute: 60_000,
        });
        for last in 1..=10 {
            limits.check(Bucket::Login, ip(last)).unwrap();
        }
        limits.check(Bucket::PlaybackStart, ip(1)).unwrap();
        assert_eq!(limits.login.len(), 10);

        std::thread::sleep(std::time::Duration::from_millis(20));
        limits.retain_recent();

        assert!(limits.login.is_empty());
        assert!(limits.playback_start.is_empty());
    }

    #[test]
    fn test_retain_recent_keeps_throttled_addresses() {
        let limits = RateLimits::new(RateLimitConfig {
            login_per_minute: 1,
            playback_start_per_minute: 1,
        });
        limits.check(Bucket::Login, ip(1)).unwrap();

        limits.retain_recent();

        assert_eq!(limits.login.len(), 1);
        assert!(limits.check(Bucket::Login, ip(1)).is_err());
    }

    #[test]
    fn test_check_buckets_are_independent() {
        let limits = RateLimits::new(RateLimitConfig {
            login_per_minute: 1,
            playback_start_per_minute: 1,
        });

        assert!(limits.check(Bucket::Login, ip(1)).is_ok());
        assert!(limits.check(Bucket::PlaybackStart, ip(1)).is_ok());
    }
}
