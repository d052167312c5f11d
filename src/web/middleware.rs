//! Rate-limit and panic middleware.
//!
//! Both rate-limit layers share one [`RateLimiter`](crate::RateLimiter).
//! `/search` is checked against the `global` and `search` scopes in a single
//! step, every other route against `global` only. A request rejected by any
//! scope never reaches its handler and is not counted anywhere.

use std::any::Any;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use crate::error::{Error, ErrorBody};
use crate::rate_limit::{Quota, RateLimitDecision};

use super::AppState;

/// Scope applied to every route.
pub const GLOBAL_SCOPE: &str = "global";

/// Scope applied to `/search` in addition to the global one.
pub const SEARCH_SCOPE: &str = "search";

/// Applies the default quotas.
pub async fn limit_all_routes(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let scopes = [(GLOBAL_SCOPE, &state.default_limits[..])];
    enforce(&state, &scopes, peer, request, next).await
}

/// Applies the default quotas and the search quotas together.
pub async fn limit_search(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let scopes = [
        (GLOBAL_SCOPE, &state.default_limits[..]),
        (SEARCH_SCOPE, &state.search_limits[..]),
    ];
    enforce(&state, &scopes, peer, request, next).await
}

async fn enforce(
    state: &AppState,
    scopes: &[(&'static str, &[Quota])],
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    // Without a peer address every caller shares one bucket.
    let client = peer
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match state.limiter.check_scopes(scopes, client) {
        RateLimitDecision::Allow => next.run(request).await,
        RateLimitDecision::Deny { quota, retry_after } => {
            warn!(%client, %quota, path = %request.uri().path(), "rate limit exceeded");
            Error::RateLimited { quota, retry_after }.into_response()
        }
    }
}

/// Turns a handler panic into a `500` with a JSON error body.
///
/// Used with `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "Internal server error".to_string(),
        }),
    )
        .into_response()
}
