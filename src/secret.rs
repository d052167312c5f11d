use std::fmt;

/// A wrapper that prevents accidental exposure of sensitive values.
///
/// Holds the upstream bearer credential. The wrapped value is only reachable
/// through [`expose_secret`](Self::expose_secret), so it never ends up in a
/// log line or an error message by accident.
///
/// # Examples
///
/// ```
/// use item_search_proxy::Secret;
///
/// let api_key = Secret::new("v^1.1#i^1#r^0".to_string());
///
/// assert_eq!(format!("{:?}", api_key), "[REDACTED]");
/// assert_eq!(format!("{}", api_key), "[REDACTED]");
///
/// assert_eq!(api_key.expose_secret(), "v^1.1#i^1#r^0");
/// ```
// Do NOT add Clone, Copy or Default derives: secrets must not be duplicated carelessly.
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value in a `Secret`.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// Only call this where the value is handed to the transport; never log
    /// or format the result.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
