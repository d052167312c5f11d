use std::sync::Arc;

use crate::rate_limit::{Quota, RateLimiter};
use crate::session::SessionStore;
use crate::upstream::UpstreamClient;
use crate::HtmlSanitizer;

/// Session capacity used when none is configured.
pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;

/// Longest query accepted when none is configured.
pub const DEFAULT_MAX_QUERY_LEN: usize = 256;

/// Shared handles every route works with.
///
/// Cloned per request; all fields are reference counted.
#[derive(Clone)]
pub struct AppState {
    pub(crate) sessions: SessionStore,
    pub(crate) limiter: RateLimiter,
    pub(crate) query_sanitizer: Arc<HtmlSanitizer>,
    pub(crate) upstream: Arc<UpstreamClient>,
    pub(crate) default_limits: Arc<[Quota]>,
    pub(crate) search_limits: Arc<[Quota]>,
}

impl AppState {
    /// Creates the state with default sessions, quotas and query limit.
    pub fn new(upstream: UpstreamClient) -> Self {
        Self {
            sessions: SessionStore::new(DEFAULT_SESSION_CAPACITY),
            limiter: RateLimiter::new(),
            query_sanitizer: Arc::new(HtmlSanitizer::new().with_max_len(DEFAULT_MAX_QUERY_LEN)),
            upstream: Arc::new(upstream),
            default_limits: Arc::from([Quota::per_day(100), Quota::per_minute(10)]),
            search_limits: Arc::from([Quota::per_minute(10)]),
        }
    }

    /// Replaces the session store.
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    /// Replaces the rate limiter.
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Sets the quotas for every route and the extra quotas for `/search`.
    pub fn with_limits(mut self, default: Vec<Quota>, search: Vec<Quota>) -> Self {
        self.default_limits = default.into();
        self.search_limits = search.into();
        self
    }

    /// Sets the longest accepted query.
    ///
    /// # Panics
    ///
    /// Panics if `max_len` is 0.
    pub fn with_max_query_len(mut self, max_len: usize) -> Self {
        self.query_sanitizer = Arc::new(HtmlSanitizer::new().with_max_len(max_len));
        self
    }

    /// Returns the session store.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions)
            .field("upstream", &self.upstream)
            .field("default_limits", &self.default_limits)
            .field("search_limits", &self.search_limits)
            .finish_non_exhaustive()
    }
}
