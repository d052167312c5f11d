use std::fmt;

/// A wrapper for untrusted data that must be explicitly sanitized before use.
///
/// `Tainted<T>` marks data that crossed a trust boundary: query parameters,
/// cookies, and every field of the upstream search payload. The value cannot
/// be read outside this crate; it only leaves the wrapper through a
/// [`Sanitizer`](crate::Sanitizer), which produces a [`Verified<T>`](crate::Verified).
///
/// # Examples
///
/// ```
/// use item_search_proxy::Tainted;
///
/// let query = Tainted::new("<script>alert(1)</script>phone".to_string());
///
/// // Debug output shows it's tainted (for development)
/// println!("{:?}", query);
///
/// // But you CANNOT use the value directly:
/// // let url = format!("{}?q={}", base, query); // Won't compile!
/// ```
// Clone is kept so a tainted value can be inspected by more than one validator.
#[derive(Clone)]
pub struct Tainted<T> {
    // MUST remain private: external code has to go through a Sanitizer.
    inner: T,
}

impl<T> Tainted<T> {
    /// Wraps an untrusted value in `Tainted`.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Extracts the inner value for sanitization.
    ///
    /// Only sanitizers and the token comparison inside this crate may call it.
    pub(crate) fn into_inner(self) -> T {
        self.inner
    }

    /// Borrows the inner value for crate-internal validation that does not
    /// consume the wrapper (presence and emptiness checks).
    pub(crate) fn peek(&self) -> &T {
        &self.inner
    }

    /// Transforms the untrusted value without releasing it from taint.
    ///
    /// # Examples
    ///
    /// ```
    /// use item_search_proxy::Tainted;
    ///
    /// let value = Tainted::new("10".to_string());
    /// let price = value.map(|v| format!("{v} USD"));
    /// # let _ = price;
    /// ```
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Tainted<U> {
        Tainted::new(f(self.inner))
    }
}

// Do NOT add Deref, AsRef, Borrow, From<T> or Into<T>: any implicit conversion
// lets unsanitized data reach the upstream request or the result store.

impl<T: fmt::Debug> fmt::Debug for Tainted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tainted")
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tainted_wraps_value() {
        let user_input = Tainted::new("<b>phone</b>".to_string());
        let debug_output = format!("{:?}", user_input);

        assert!(debug_output.contains("Tainted"));
        assert!(debug_output.contains("<b>phone</b>"));
    }

    #[test]
    fn map_keeps_value_tainted() {
        let price = Tainted::new("10".to_string()).map(|v| format!("{v} USD"));

        assert_eq!(price.peek(), "10 USD");
        assert_eq!(price.into_inner(), "10 USD");
    }

    #[test]
    fn clones_are_independent_copies() {
        let cookie = Tainted::new(String::from("0123abcd"));
        let copy = cookie.clone().map(|mut v| {
            v.push_str("ef");
            v
        });

        assert_eq!(cookie.peek(), "0123abcd");
        assert_eq!(copy.peek(), "0123abcdef");
    }

    mod proptests {
        use super::*;
        use crate::{HtmlSanitizer, Sanitizer};
        use proptest::prelude::*;

        proptest! {
            /// Cloning a tainted value yields identical sanitization outcomes.
            #[test]
            fn proptest_tainted_clone_sanitizes_identically(input in "[a-zA-Z0-9 <>/&]{0,64}") {
                let sanitizer = HtmlSanitizer::new();

                let tainted1 = Tainted::new(input);
                let tainted2 = tainted1.clone();

                let first = sanitizer.sanitize(tainted1).expect("no length limit");
                let second = sanitizer.sanitize(tainted2).expect("no length limit");

                prop_assert_eq!(first, second);
            }
        }
    }
}
