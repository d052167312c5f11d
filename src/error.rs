use std::fmt;
use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::rate_limit::Quota;
use crate::sanitizer::SanitizationError;
use crate::store::StoreError;

/// Errors surfaced by the search path.
///
/// Validation failures map to client errors; everything else maps to a
/// server error carrying the message.
#[derive(Debug, Error)]
pub enum Error {
    /// The submitted anti-forgery token is absent or does not match the session's.
    #[error("Invalid CSRF token")]
    InvalidToken,

    /// A required query parameter is absent or empty.
    #[error("Missing '{0}' parameter")]
    MissingParameter(&'static str),

    /// A query parameter was rejected by its sanitizer.
    #[error("Invalid '{name}' parameter: {source}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why it was rejected.
        source: SanitizationError,
    },

    /// The client exhausted a rate-limit quota.
    #[error("Rate limit exceeded: {quota}")]
    RateLimited {
        /// The exhausted quota.
        quota: Quota,
        /// Time until the quota's window resets.
        retry_after: Duration,
    },

    /// Every upstream attempt failed.
    #[error("Failed to fetch data from upstream")]
    UpstreamExhausted,

    /// The upstream answered with success but an unexpected payload.
    #[error("Malformed upstream payload: {0}")]
    UpstreamMalformed(String),

    /// Results could not be persisted.
    #[error("Failed to persist results: {0}")]
    Storage(#[from] StoreError),
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidToken => ErrorKind::InvalidToken,
            Error::MissingParameter(_) => ErrorKind::MissingParameter,
            Error::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::UpstreamExhausted => ErrorKind::UpstreamExhausted,
            Error::UpstreamMalformed(_) => ErrorKind::UpstreamMalformed,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Returns the HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }
}

/// Fieldless classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Anti-forgery token absent or mismatched
    InvalidToken,
    /// Required parameter absent
    MissingParameter,
    /// Parameter rejected by sanitization
    InvalidParameter,
    /// Quota exceeded
    RateLimited,
    /// All upstream attempts failed
    UpstreamExhausted,
    /// Unexpected upstream payload shape
    UpstreamMalformed,
    /// Persistence failure
    Storage,
}

impl ErrorKind {
    /// Returns `true` for errors caused by the client's request.
    pub fn is_client_error(self) -> bool {
        self.status().is_client_error()
    }

    /// HTTP status for this kind.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::InvalidToken | ErrorKind::MissingParameter | ErrorKind::InvalidParameter => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::UpstreamExhausted | ErrorKind::UpstreamMalformed | ErrorKind::Storage => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidToken => write!(f, "invalid_token"),
            ErrorKind::MissingParameter => write!(f, "missing_parameter"),
            ErrorKind::InvalidParameter => write!(f, "invalid_parameter"),
            ErrorKind::RateLimited => write!(f, "rate_limited"),
            ErrorKind::UpstreamExhausted => write!(f, "upstream_exhausted"),
            ErrorKind::UpstreamMalformed => write!(f, "upstream_malformed"),
            ErrorKind::Storage => write!(f, "storage"),
        }
    }
}

/// JSON body of every error response: `{"error": "<reason>"}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            Error::RateLimited { retry_after, .. } => Some(retry_after.as_secs().max(1)),
            _ => None,
        };

        let mut response = (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitizer::SanitizationErrorKind;

    #[test]
    fn validation_errors_are_client_errors() {
        assert_eq!(Error::InvalidToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::MissingParameter("q").status(), StatusCode::BAD_REQUEST);
        assert!(Error::InvalidToken.kind().is_client_error());

        let too_long = Error::InvalidParameter {
            name: "q",
            source: SanitizationError::new(SanitizationErrorKind::TooLong, "limit 5"),
        };
        assert_eq!(too_long.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_errors_are_server_errors() {
        assert_eq!(
            Error::UpstreamExhausted.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::UpstreamMalformed("missing field".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(!Error::UpstreamExhausted.kind().is_client_error());
    }

    #[test]
    fn rate_limited_has_its_own_status() {
        let error = Error::RateLimited {
            quota: Quota::per_minute(10),
            retry_after: Duration::from_secs(12),
        };

        assert_eq!(error.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error.to_string(), "Rate limit exceeded: 10 per minute");
    }

    #[test]
    fn messages_match_client_contract() {
        assert_eq!(Error::InvalidToken.to_string(), "Invalid CSRF token");
        assert_eq!(
            Error::MissingParameter("q").to_string(),
            "Missing 'q' parameter"
        );
        assert_eq!(
            Error::UpstreamExhausted.to_string(),
            "Failed to fetch data from upstream"
        );
    }

    #[test]
    fn rate_limited_response_sets_retry_after() {
        let response = Error::RateLimited {
            quota: Quota::per_minute(10),
            retry_after: Duration::from_millis(200),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from_static("1"))
        );
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(ErrorKind::UpstreamExhausted.to_string(), "upstream_exhausted");
        assert_eq!(ErrorKind::InvalidToken.to_string(), "invalid_token");
    }
}
