//! Per-client fixed-window rate limiting.
//!
//! Every request belongs to one or more scopes (`global` for all routes,
//! `search` additionally for `/search`). Each scope carries a list of
//! [`Quota`]s; a request passes only if every quota of the scope still has
//! room in its current window, and only then are the counters hit.
//!
//! Counters are kept per `(scope, client address, quota)` in an LRU so the
//! memory used by one-off clients stays bounded.

use std::fmt;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use thiserror::Error;

/// Maximum number of `(scope, client, quota)` windows tracked at once.
const MAX_TRACKED_WINDOWS: usize = 100_000;

/// A request allowance over a fixed period, e.g. `10 per minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quota {
    /// Requests allowed per window.
    pub limit: u32,
    /// Window length.
    pub period: Duration,
}

impl Quota {
    /// `limit` requests per second.
    pub const fn per_second(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(1),
        }
    }

    /// `limit` requests per minute.
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(60),
        }
    }

    /// `limit` requests per hour.
    pub const fn per_hour(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(60 * 60),
        }
    }

    /// `limit` requests per day.
    pub const fn per_day(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Parses a `;`-separated list such as `"100 per day; 10 per minute"`.
    ///
    /// # Errors
    ///
    /// Returns `QuotaParseError` on the first item that does not parse.
    pub fn parse_list(spec: &str) -> Result<Vec<Self>, QuotaParseError> {
        spec.split(';')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.period.as_secs() {
            1 => "second",
            60 => "minute",
            3600 => "hour",
            86400 => "day",
            secs => return write!(f, "{} per {}s", self.limit, secs),
        };
        write!(f, "{} per {}", self.limit, unit)
    }
}

/// Error returned for an unparseable quota string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid rate limit {input:?}: expected \"<count> per <second|minute|hour|day>\"")]
pub struct QuotaParseError {
    input: String,
}

impl FromStr for Quota {
    type Err = QuotaParseError;

    /// Accepts `"10 per minute"`, `"10/minute"` and `"10 per 1 minute"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || QuotaParseError {
            input: s.to_string(),
        };

        let normalized = s.trim().to_ascii_lowercase().replace('/', " per ");
        let (count, unit) = normalized.split_once(" per ").ok_or_else(err)?;
        let limit: u32 = count.trim().parse().map_err(|_| err())?;

        let mut unit_parts = unit.split_whitespace();
        let (multiplier, unit) = match (unit_parts.next(), unit_parts.next(), unit_parts.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(n), Some(unit), None) => (n.parse::<u64>().map_err(|_| err())?, unit),
            _ => return Err(err()),
        };

        let base = match unit.trim_end_matches('s') {
            "second" => 1,
            "minute" => 60,
            "hour" => 60 * 60,
            "day" => 24 * 60 * 60,
            _ => return Err(err()),
        };

        if limit == 0 || multiplier == 0 {
            return Err(err());
        }

        Ok(Self {
            limit,
            period: Duration::from_secs(base * multiplier),
        })
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request may proceed; counters were hit.
    Allow,
    /// Request rejected; nothing was counted.
    Deny {
        /// The quota that is exhausted.
        quota: Quota,
        /// Time until that quota's window resets.
        retry_after: Duration,
    },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

impl Window {
    fn current(self, quota: &Quota, now: Instant) -> Self {
        if now.saturating_duration_since(self.started) >= quota.period {
            Self {
                started: now,
                hits: 0,
            }
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    scope: &'static str,
    client: IpAddr,
    quota: Quota,
}

type ExemptionHook = dyn Fn(IpAddr) -> bool + Send + Sync;

/// Shared fixed-window rate limiter.
///
/// # Examples
///
/// ```
/// use std::net::{IpAddr, Ipv4Addr};
/// use item_search_proxy::{Quota, RateLimitDecision, RateLimiter};
///
/// let limiter = RateLimiter::new();
/// let client = IpAddr::V4(Ipv4Addr::LOCALHOST);
/// let quotas = [Quota::per_minute(1)];
///
/// assert_eq!(limiter.check("search", client, &quotas), RateLimitDecision::Allow);
/// assert!(matches!(
///     limiter.check("search", client, &quotas),
///     RateLimitDecision::Deny { .. }
/// ));
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<LruCache<WindowKey, Window>>>,
    exempt: Arc<ExemptionHook>,
}

impl RateLimiter {
    /// Creates a limiter with no exemptions.
    pub fn new() -> Self {
        Self::with_capacity(MAX_TRACKED_WINDOWS)
    }

    fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            windows: Arc::new(Mutex::new(LruCache::new(capacity))),
            exempt: Arc::new(|_| false),
        }
    }

    /// Installs a hook deciding which clients skip rate limiting entirely.
    ///
    /// The default hook exempts nobody.
    pub fn with_exemption(mut self, hook: impl Fn(IpAddr) -> bool + Send + Sync + 'static) -> Self {
        self.exempt = Arc::new(hook);
        self
    }

    /// Checks and, if allowed, counts one request from `client` in `scope`.
    pub fn check(&self, scope: &'static str, client: IpAddr, quotas: &[Quota]) -> RateLimitDecision {
        self.check_at(scope, client, quotas, Instant::now())
    }

    /// [`check`](Self::check) against an explicit clock reading.
    pub fn check_at(
        &self,
        scope: &'static str,
        client: IpAddr,
        quotas: &[Quota],
        now: Instant,
    ) -> RateLimitDecision {
        self.check_scopes_at(&[(scope, quotas)], client, now)
    }

    /// Checks every scope at once and counts the request in all of them only
    /// if none denies it.
    pub fn check_scopes(&self, scopes: &[(&'static str, &[Quota])], client: IpAddr) -> RateLimitDecision {
        self.check_scopes_at(scopes, client, Instant::now())
    }

    /// [`check_scopes`](Self::check_scopes) against an explicit clock reading.
    pub fn check_scopes_at(
        &self,
        scopes: &[(&'static str, &[Quota])],
        client: IpAddr,
        now: Instant,
    ) -> RateLimitDecision {
        if (self.exempt)(client) {
            return RateLimitDecision::Allow;
        }

        let mut windows = self.windows.lock();
        let mut pending = Vec::new();

        for &(scope, quotas) in scopes {
            for quota in quotas {
                let key = WindowKey {
                    scope,
                    client,
                    quota: *quota,
                };
                let window = windows
                    .get(&key)
                    .copied()
                    .map(|w| w.current(quota, now))
                    .unwrap_or(Window {
                        started: now,
                        hits: 0,
                    });

                if window.hits >= quota.limit {
                    let retry_after = quota
                        .period
                        .saturating_sub(now.saturating_duration_since(window.started));
                    return RateLimitDecision::Deny {
                        quota: *quota,
                        retry_after,
                    };
                }

                pending.push((key, window));
            }
        }

        for (key, mut window) in pending {
            window.hits += 1;
            windows.put(key, window);
        }

        RateLimitDecision::Allow
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked_windows", &self.windows.lock().len())
            .finish()
    }
}
