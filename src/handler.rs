//! The search operation, independent of any HTTP framework.
//!
//! [`handle_search`] enforces the order of checks for one search request:
//! anti-forgery token, query presence, query sanitization, then the upstream
//! call. Nothing reaches the upstream before all checks pass.

use crate::error::Error;
use crate::logging::RequestLog;
use crate::session::{verify_token, AntiForgeryToken};
use crate::upstream::UpstreamClient;
use crate::{HtmlSanitizer, Product, Sanitizer, Tainted};

/// Query parameter holding the search text.
pub const QUERY_PARAM: &str = "q";

/// Query parameter holding the anti-forgery token.
pub const TOKEN_PARAM: &str = "csrf_token";

/// Untrusted inputs of one search request.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Raw `q` parameter.
    pub query: Option<Tainted<String>>,
    /// Raw `csrf_token` parameter.
    pub submitted_token: Option<Tainted<String>>,
}

impl SearchRequest {
    /// Creates a request from its two raw parameters.
    pub fn new(query: Option<Tainted<String>>, submitted_token: Option<Tainted<String>>) -> Self {
        Self {
            query,
            submitted_token,
        }
    }
}

/// Runs one search.
///
/// `session_token` is the token currently stored for the caller's session,
/// if any.
///
/// # Errors
///
/// - [`Error::InvalidToken`] if the submitted token is absent or does not match
/// - [`Error::MissingParameter`] if `q` is absent or empty
/// - [`Error::InvalidParameter`] if `q` is rejected by the sanitizer
/// - upstream and storage errors from [`UpstreamClient::fetch`]
pub async fn handle_search(
    request: SearchRequest,
    session_token: Option<&AntiForgeryToken>,
    sanitizer: &HtmlSanitizer,
    upstream: &UpstreamClient,
    log: &RequestLog<'_>,
) -> Result<Vec<Product>, Error> {
    if let Err(e) = verify_token(request.submitted_token.as_ref(), session_token) {
        log.warn(format_args!("rejected search: anti-forgery token mismatch"));
        return Err(e);
    }

    let query = request
        .query
        .filter(|q| !q.peek().is_empty())
        .ok_or_else(|| {
            log.warn(format_args!("rejected search: missing '{}'", QUERY_PARAM));
            Error::MissingParameter(QUERY_PARAM)
        })?;

    let query = sanitizer.sanitize(query).map_err(|source| {
        log.warn(format_args!("rejected search: {}", source));
        Error::InvalidParameter {
            name: QUERY_PARAM,
            source,
        }
    })?;

    log.info(format_args!("searching upstream for {:?}", query.as_ref()));
    upstream.fetch(&query, log).await
}
