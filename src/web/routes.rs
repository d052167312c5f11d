//! Route handlers.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;

use crate::error::Error;
use crate::handler::{handle_search, SearchRequest, QUERY_PARAM, TOKEN_PARAM};
use crate::logging::RequestLog;
use crate::session::SessionId;
use crate::Product;

use super::{AppState, ExtractTaintedInputs, RequestAdapter};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

/// `GET /search?q=…&csrf_token=…`
pub async fn search(
    State(state): State<AppState>,
    adapter: RequestAdapter,
) -> Result<Json<Vec<Product>>, Error> {
    let log = RequestLog::new(adapter.request_id());
    let inputs = adapter.extract_tainted_inputs();

    let stored = inputs
        .get_cookie(SESSION_COOKIE)
        .and_then(SessionId::from_cookie)
        .and_then(|session| state.sessions.token_for(&session));

    let request = SearchRequest::new(inputs.get_query(QUERY_PARAM), inputs.get_query(TOKEN_PARAM));

    let result = handle_search(
        request,
        stored.as_ref(),
        &state.query_sanitizer,
        &state.upstream,
        &log,
    )
    .await;

    if let Err(e) = &result {
        if e.kind().is_client_error() {
            log.debug(format_args!("search rejected: {}", e.kind()));
        } else {
            log.error(format_args!("search failed: {}", e));
        }
    }

    result.map(Json)
}

/// `GET /search_form`
///
/// Issues a fresh token for the caller's session, creating the session if
/// the request carried none, and renders the form.
pub async fn search_form(State(state): State<AppState>, adapter: RequestAdapter) -> Response {
    let log = RequestLog::new(adapter.request_id());
    let inputs = adapter.extract_tainted_inputs();

    let existing = inputs
        .get_cookie(SESSION_COOKIE)
        .and_then(SessionId::from_cookie)
        .filter(|session| state.sessions.contains(session));

    let (session, is_new) = match existing {
        Some(session) => (session, false),
        None => (SessionId::generate(), true),
    };

    let token = state.sessions.issue(&session);
    log.debug(format_args!("issued form token (new session: {})", is_new));

    let mut response = Html(render_form(token.as_str())).into_response();

    if is_new {
        let cookie = format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            session.as_str()
        );
        // Session ids are hex, always a valid header value.
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(SET_COOKIE, value);
        }
    }

    response
}

fn render_form(token: &str) -> String {
    format!(
        r#"<form action="/search" method="get">
    <input type="text" name="{QUERY_PARAM}" placeholder="Search query">
    <input type="hidden" name="{TOKEN_PARAM}" value="{token}">
    <input type="submit" value="Search">
</form>
"#
    )
}
