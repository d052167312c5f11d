//! Request adapter mapping axum requests to crate types.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts, Query};
use axum::http::header::COOKIE;
use axum::http::request::Parts;

use crate::request::{request_id_from, RequestMeta, REQUEST_ID_HEADER};
use crate::Tainted;

use super::{ExtractMetadata, ExtractTaintedInputs};

/// Owned snapshot of the parts of a request the search service reads.
///
/// Built by the [`FromRequestParts`] impl in handlers, or by hand in tests.
/// Query parameters and cookies stay raw here; they only leave as
/// [`Tainted`] values through [`ExtractTaintedInputs`].
///
/// # Examples
///
/// ```
/// use item_search_proxy::web::{RequestAdapter, ExtractMetadata, ExtractTaintedInputs};
///
/// let mut adapter = RequestAdapter::new("req-12345".to_string());
/// adapter.add_query_param("q".to_string(), "<b>phone</b>".to_string());
/// adapter.add_cookie("session".to_string(), "0123".to_string());
///
/// let meta = adapter.extract_metadata();
/// assert_eq!(meta.request_id, "req-12345");
///
/// let inputs = adapter.extract_tainted_inputs();
/// assert!(inputs.get_query("q").is_some());
/// assert!(inputs.get_cookie("session").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct RequestAdapter {
    request_id: String,
    client_ip: Option<IpAddr>,
    query_params: HashMap<String, String>,
    cookies: HashMap<String, String>,
}

impl RequestAdapter {
    /// Creates an adapter with the given request id and no inputs.
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            client_ip: None,
            query_params: HashMap::new(),
            cookies: HashMap::new(),
        }
    }

    /// Records the peer address.
    pub fn set_client_ip(&mut self, ip: Option<IpAddr>) {
        self.client_ip = ip;
    }

    /// Adds a query parameter. The first value of a repeated name wins.
    pub fn add_query_param(&mut self, key: String, value: String) {
        self.query_params.entry(key).or_insert(value);
    }

    /// Adds a cookie. The first value of a repeated name wins.
    pub fn add_cookie(&mut self, name: String, value: String) {
        self.cookies.entry(name).or_insert(value);
    }

    /// Returns the request id.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the peer address, if known.
    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    fn add_cookie_header(&mut self, header: &str) {
        for pair in header.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                self.add_cookie(name.trim().to_string(), value.trim().to_string());
            }
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestAdapter
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let supplied_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok());
        let mut adapter = RequestAdapter::new(request_id_from(supplied_id));

        let peer = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr.ip());
        adapter.set_client_ip(peer);

        // A query string that does not decode is treated as empty.
        if let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri) {
            for (key, value) in pairs {
                adapter.add_query_param(key, value);
            }
        }

        for header in parts.headers.get_all(COOKIE) {
            if let Ok(header) = header.to_str() {
                adapter.add_cookie_header(header);
            }
        }

        Ok(adapter)
    }
}

impl ExtractMetadata for RequestAdapter {
    fn extract_metadata(&self) -> RequestMeta {
        RequestMeta {
            request_id: self.request_id.clone(),
            client_ip: self.client_ip,
        }
    }
}

impl ExtractTaintedInputs for RequestAdapter {
    fn extract_tainted_inputs(&self) -> TaintedInputs {
        TaintedInputs {
            query_params: self
                .query_params
                .iter()
                .map(|(k, v)| (k.clone(), Tainted::new(v.clone())))
                .collect(),
            cookies: self
                .cookies
                .iter()
                .map(|(k, v)| (k.clone(), Tainted::new(v.clone())))
                .collect(),
        }
    }
}

/// Untrusted inputs of one request, read-only.
#[derive(Debug, Clone)]
pub struct TaintedInputs {
    query_params: HashMap<String, Tainted<String>>,
    cookies: HashMap<String, Tainted<String>>,
}

impl TaintedInputs {
    /// Returns all tainted query parameters.
    pub fn query_params(&self) -> &HashMap<String, Tainted<String>> {
        &self.query_params
    }

    /// Returns all tainted cookies.
    pub fn cookies(&self) -> &HashMap<String, Tainted<String>> {
        &self.cookies
    }

    /// Returns a copy of the named query parameter.
    pub fn get_query(&self, name: &str) -> Option<Tainted<String>> {
        self.query_params.get(name).cloned()
    }

    /// Returns a copy of the named cookie.
    pub fn get_cookie(&self, name: &str) -> Option<Tainted<String>> {
        self.cookies.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn adapt(request: Request<()>) -> RequestAdapter {
        let (mut parts, ()) = request.into_parts();
        match RequestAdapter::from_request_parts(&mut parts, &()).await {
            Ok(adapter) => adapter,
            Err(never) => match never {},
        }
    }

    #[test]
    fn first_query_value_wins() {
        let mut adapter = RequestAdapter::new("req-1".to_string());
        adapter.add_query_param("q".to_string(), "first".to_string());
        adapter.add_query_param("q".to_string(), "second".to_string());

        let inputs = adapter.extract_tainted_inputs();
        assert_eq!(inputs.query_params().len(), 1);
        assert_eq!(inputs.get_query("q").map(|q| q.into_inner()), Some("first".to_string()));
    }

    #[test]
    fn extract_metadata_includes_client_ip() {
        let mut adapter = RequestAdapter::new("req-meta".to_string());
        adapter.set_client_ip(Some(IpAddr::from([10, 0, 0, 1])));

        let meta = adapter.extract_metadata();
        assert_eq!(meta.request_id, "req-meta");
        assert_eq!(meta.client_ip, Some(IpAddr::from([10, 0, 0, 1])));
    }

    #[tokio::test]
    async fn reads_query_cookies_and_request_id() {
        let request = Request::builder()
            .uri("/search?q=%3Cb%3Ephone%3C%2Fb%3E&csrf_token=abc")
            .header(REQUEST_ID_HEADER, "req-from-client")
            .header(COOKIE, "theme=dark; session=0123abcd")
            .body(())
            .unwrap();

        let adapter = adapt(request).await;
        let inputs = adapter.extract_tainted_inputs();

        assert_eq!(adapter.request_id(), "req-from-client");
        assert_eq!(
            inputs.get_query("q").map(|q| q.into_inner()),
            Some("<b>phone</b>".to_string())
        );
        assert_eq!(
            inputs.get_query("csrf_token").map(|t| t.into_inner()),
            Some("abc".to_string())
        );
        assert_eq!(
            inputs.get_cookie("session").map(|s| s.into_inner()),
            Some("0123abcd".to_string())
        );
        assert_eq!(inputs.cookies().len(), 2);
    }

    #[tokio::test]
    async fn missing_pieces_yield_empty_inputs() {
        let request = Request::builder().uri("/search").body(()).unwrap();

        let adapter = adapt(request).await;
        let inputs = adapter.extract_tainted_inputs();

        assert!(inputs.query_params().is_empty());
        assert!(inputs.cookies().is_empty());
        assert!(adapter.client_ip().is_none());
        assert_eq!(adapter.request_id().len(), 36);
    }
}
