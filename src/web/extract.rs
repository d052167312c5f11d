//! Extraction boundary traits.

use crate::request::RequestMeta;

use super::TaintedInputs;

/// Extracts request metadata from a request representation.
///
/// Implementations only map types; they never validate or sanitize.
///
/// # Examples
///
/// ```
/// use item_search_proxy::web::ExtractMetadata;
/// use item_search_proxy::RequestMeta;
///
/// struct Probe {
///     id: String,
/// }
///
/// impl ExtractMetadata for Probe {
///     fn extract_metadata(&self) -> RequestMeta {
///         RequestMeta {
///             request_id: self.id.clone(),
///             client_ip: None,
///         }
///     }
/// }
///
/// let meta = Probe { id: "req-7".to_string() }.extract_metadata();
/// assert_eq!(meta.request_id, "req-7");
/// ```
pub trait ExtractMetadata {
    /// Returns the request id and peer address.
    fn extract_metadata(&self) -> RequestMeta;
}

/// Extracts untrusted inputs from a request representation.
///
/// Every value crossing the HTTP boundary comes out wrapped in
/// [`Tainted`](crate::Tainted).
pub trait ExtractTaintedInputs {
    /// Collects query parameters and cookies as tainted values.
    fn extract_tainted_inputs(&self) -> TaintedInputs;
}
