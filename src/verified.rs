/// A wrapper for data that has passed through a [`Sanitizer`](crate::Sanitizer).
///
/// `Verified<T>` is the only form in which a search query may be sent
/// upstream and the only form in which a [`Product`](crate::Product) may be
/// written to a [`ResultStore`](crate::ResultStore).
///
/// # Construction Invariants
///
/// There is no public constructor and no `From<T>` implementation. Values are
/// created inside the crate by sanitizers (through `new_unchecked`) after the
/// input has been cleaned.
///
/// ```compile_fail
/// use item_search_proxy::Verified;
///
/// // This will not compile - no public constructor:
/// let verified = Verified::new("data".to_string());
/// ```
///
/// # Access
///
/// - [`AsRef::as_ref`]: borrow the verified value
/// - [`into_inner`](Self::into_inner): consume and extract the value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified<T> {
    inner: T,
}

impl<T> Verified<T> {
    /// Creates a `Verified<T>` without performing validation.
    ///
    /// Callers must have sanitized `value` already.
    pub(crate) fn new_unchecked(value: T) -> Self {
        Self { inner: value }
    }

    /// Consumes the `Verified<T>` and returns the inner value.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> AsRef<T> for Verified<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Product;

    #[test]
    fn product_fields_are_readable_once_verified() {
        let product = Verified::new_unchecked(Product {
            title: "<b>Phone</b>".to_string(),
            price: "10 USD".to_string(),
            url: "http://x".to_string(),
        });

        assert_eq!(product.as_ref().price, "10 USD");
        assert_eq!(product.clone().into_inner(), product.into_inner());
    }

    #[test]
    fn debug_shows_wrapper_and_value() {
        let query = Verified::new_unchecked("phone".to_string());
        let debug_output = format!("{:?}", query);

        assert!(debug_output.starts_with("Verified"));
        assert!(debug_output.contains("phone"));
    }

    mod proptests {
        use super::*;
        use crate::{HtmlSanitizer, Sanitizer, Tainted};
        use proptest::prelude::*;

        proptest! {
            /// Markup-free text survives the Tainted → Sanitizer → Verified flow.
            #[test]
            fn proptest_plain_text_survives_sanitization(input in "[a-zA-Z0-9 _-]{1,80}") {
                let sanitizer = HtmlSanitizer::new();
                let verified = sanitizer
                    .sanitize(Tainted::new(input.clone()))
                    .expect("no length limit");

                prop_assert_eq!(verified.as_ref(), &input);
            }
        }
    }
}
