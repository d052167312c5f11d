//! Single-endpoint search proxy with taint tracking.
//!
//! The proxy serves an HTML search form and a JSON search endpoint that
//! forwards the query to a third-party item-search API. Every value that
//! crosses a trust boundary is typed:
//!
//! - **Taint tracking**: request parameters, cookies and upstream payload
//!   fields arrive as [`Tainted<T>`] and can only become [`Verified<T>`]
//!   through a [`Sanitizer`]
//! - **Verified sinks**: the upstream client only accepts a verified query,
//!   and the [`ResultStore`] only accepts verified products
//! - **Secrets**: the upstream credential is a [`Secret<T>`] and never
//!   appears in logs or debug output
//!
//! # Core Types
//!
//! - [`HtmlSanitizer`], [`LinkifySanitizer`]: allow-list HTML cleaning
//! - [`SessionStore`]: per-session anti-forgery tokens
//! - [`UpstreamClient`]: retrying client for the search API
//! - [`RateLimiter`]: fixed-window per-client quotas
//! - [`web::router`]: the axum application
//!
//! # Examples
//!
//! ```
//! use item_search_proxy::{HtmlSanitizer, Sanitizer, Secret, Tainted};
//!
//! // Secrets are redacted
//! let api_key = Secret::new("super-secret-key".to_string());
//! assert_eq!(format!("{:?}", api_key), "[REDACTED]");
//!
//! // Untrusted input must be sanitized before use
//! let query = Tainted::new("<script>x</script><b>phone</b>".to_string());
//! let verified = HtmlSanitizer::new().sanitize(query).expect("no length limit");
//! assert_eq!(verified.as_ref(), "<b>phone</b>");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handler;
mod logging;
mod product;
mod rate_limit;
mod request;
mod sanitizer;
mod secret;
mod session;
mod store;
mod tainted;
mod upstream;
mod verified;

pub mod web;

pub use config::{Config, ConfigError, StorageBackend};
pub use error::{Error, ErrorBody, ErrorKind};
pub use handler::{handle_search, SearchRequest, QUERY_PARAM, TOKEN_PARAM};
pub use logging::{init_tracing, RequestLog};
pub use product::{ItemPrice, ItemSummary, Product, ProductSanitizer, SearchPayload};
pub use rate_limit::{Quota, QuotaParseError, RateLimitDecision, RateLimiter};
pub use request::{request_id_from, RequestMeta, REQUEST_ID_HEADER};
pub use sanitizer::{
    HtmlSanitizer, LinkifySanitizer, SanitizationError, SanitizationErrorKind, Sanitizer,
    ALLOWED_TAGS,
};
pub use secret::Secret;
pub use session::{verify_token, AntiForgeryToken, SessionId, SessionStore};
pub use store::{MemoryStore, ResultStore, SqliteStore, StoreError};
pub use tainted::Tainted;
pub use upstream::{
    HttpTransport, RetryPolicy, Transport, TransportError, UpstreamClient, UpstreamRequest,
    UpstreamResponse, DEFAULT_RESULT_LIMIT,
};
pub use verified::Verified;
