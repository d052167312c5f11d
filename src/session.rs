//! Per-session anti-forgery tokens.
//!
//! Sessions are identified by a random id carried in a cookie. The store maps
//! each id to the token minted on that session's most recent form view. It is
//! an explicit handle passed into handlers, bounded by an LRU so abandoned
//! sessions are eventually forgotten.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Error;
use crate::Tainted;

/// Length of tokens and session ids in hex characters (128 bits).
const TOKEN_HEX_LEN: usize = 32;

fn random_hex() -> String {
    hex::encode(rand::random::<[u8; TOKEN_HEX_LEN / 2]>())
}

fn is_token_shaped(value: &str) -> bool {
    value.len() == TOKEN_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Identifier of one client session.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random session id.
    pub fn generate() -> Self {
        Self(random_hex())
    }

    /// Accepts a session id presented by a client, if it is well formed.
    ///
    /// Anything that is not 32 hex characters is treated as "no session".
    pub fn from_cookie(value: Tainted<String>) -> Option<Self> {
        let value = value.into_inner();
        is_token_shaped(&value).then(|| Self(value.to_ascii_lowercase()))
    }

    /// Returns the id as sent in the session cookie.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix is enough to correlate log lines.
        write!(f, "SessionId({}…)", &self.0[..8])
    }
}

/// Random opaque token proving a submission came from the session's own form.
#[derive(Clone, PartialEq, Eq)]
pub struct AntiForgeryToken(String);

impl AntiForgeryToken {
    fn generate() -> Self {
        Self(random_hex())
    }

    /// Returns the token as embedded in the form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AntiForgeryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AntiForgeryToken([REDACTED])")
    }
}

/// Checks a submitted token against the session's stored token.
///
/// # Errors
///
/// Returns [`Error::InvalidToken`] when the submitted token is absent or
/// empty, the session has no token, or the two differ.
pub fn verify_token(
    submitted: Option<&Tainted<String>>,
    stored: Option<&AntiForgeryToken>,
) -> Result<(), Error> {
    let (Some(submitted), Some(stored)) = (submitted, stored) else {
        return Err(Error::InvalidToken);
    };

    let submitted = submitted.peek();
    if submitted.is_empty() || !constant_time_eq(submitted.as_bytes(), stored.0.as_bytes()) {
        return Err(Error::InvalidToken);
    }

    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Bounded, shared map from session id to anti-forgery token.
///
/// Cloning is cheap and every clone refers to the same sessions.
///
/// # Examples
///
/// ```
/// use item_search_proxy::{SessionId, SessionStore};
///
/// let store = SessionStore::new(100);
/// let session = SessionId::generate();
///
/// let token = store.issue(&session);
/// assert_eq!(store.token_for(&session), Some(token));
/// ```
#[derive(Clone)]
pub struct SessionStore {
    tokens: Arc<Mutex<LruCache<SessionId, AntiForgeryToken>>>,
}

impl SessionStore {
    /// Creates a store remembering at most `capacity` sessions.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("session capacity must be non-zero");
        Self {
            tokens: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Mints a new token for `session`, replacing any previous one.
    pub fn issue(&self, session: &SessionId) -> AntiForgeryToken {
        let token = AntiForgeryToken::generate();
        let replaced = self.tokens.lock().put(session.clone(), token.clone());

        debug!(session = ?session, replaced = replaced.is_some(), "issued anti-forgery token");
        token
    }

    /// Returns the session's current token, if it has one.
    pub fn token_for(&self, session: &SessionId) -> Option<AntiForgeryToken> {
        self.tokens.lock().get(session).cloned()
    }

    /// Returns `true` if the store currently tracks `session`.
    pub fn contains(&self, session: &SessionId) -> bool {
        self.tokens.lock().contains(session)
    }

    /// Number of sessions currently tracked.
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    /// Returns `true` if no sessions are tracked.
    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .finish()
    }
}
