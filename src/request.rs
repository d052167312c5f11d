use std::net::IpAddr;

use uuid::Uuid;

/// Header a caller may use to supply its own request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request id that is accepted.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Metadata about an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    /// Identifier attached to every log line of this request
    pub request_id: String,
    /// Peer address, when the server knows it
    pub client_ip: Option<IpAddr>,
}

/// Picks the request id for a request.
///
/// A caller-supplied id is kept if it is short printable ASCII; otherwise a
/// fresh UUID v4 is generated.
///
/// ```
/// use item_search_proxy::request_id_from;
///
/// assert_eq!(request_id_from(Some("abc-123")), "abc-123");
/// assert_eq!(request_id_from(None).len(), 36);
/// ```
pub fn request_id_from(supplied: Option<&str>) -> String {
    match supplied.map(str::trim) {
        Some(id)
            if !id.is_empty()
                && id.len() <= MAX_REQUEST_ID_LEN
                && id.bytes().all(|b| b.is_ascii_graphic()) =>
        {
            id.to_string()
        }
        _ => Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_uuids() {
        let a = request_id_from(None);
        let b = request_id_from(None);

        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn unusable_supplied_ids_are_replaced() {
        for bad in ["", "   ", "has space", "line\nbreak"] {
            let id = request_id_from(Some(bad));
            assert!(Uuid::parse_str(&id).is_ok(), "{bad:?} should be replaced");
        }

        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        assert_ne!(request_id_from(Some(&long)), long);
    }
}
