//! HTTP surface.
//!
//! This module is the boundary between axum and the search operation:
//! - Mapping requests to [`RequestMeta`](crate::RequestMeta) and request ids
//! - Introducing taint at the boundary (query params, cookies → `Tainted<T>`)
//! - Rate limiting before any handler runs
//! - Turning handler panics into a JSON `500`
//!
//! # Routes
//!
//! | Route              | Scopes             | Response                         |
//! |--------------------|--------------------|----------------------------------|
//! | `GET /search_form` | `global`           | HTML form with a fresh token     |
//! | `GET /search`      | `global`, `search` | JSON product list or `{"error"}` |
//!
//! The server must be started with
//! `into_make_service_with_connect_info::<SocketAddr>()` so the limiter sees
//! client addresses.

mod adapter;
mod extract;
mod middleware;
mod routes;
mod state;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub use adapter::{RequestAdapter, TaintedInputs};
pub use extract::{ExtractMetadata, ExtractTaintedInputs};
pub use middleware::{limit_all_routes, limit_search, panic_response, GLOBAL_SCOPE, SEARCH_SCOPE};
pub use routes::{search, search_form, SESSION_COOKIE};
pub use state::{AppState, DEFAULT_MAX_QUERY_LEN, DEFAULT_SESSION_CAPACITY};

/// Builds the application router.
///
/// Each route carries exactly one rate-limit layer so a request is checked
/// and counted in all of its scopes at once.
pub fn router(state: AppState) -> Router {
    let search_route = get(search).route_layer(from_fn_with_state(state.clone(), limit_search));
    let form_route =
        get(search_form).route_layer(from_fn_with_state(state.clone(), limit_all_routes));

    Router::new()
        .route("/search", search_route)
        .route("/search_form", form_route)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
