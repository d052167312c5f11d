//! Products returned to clients and the upstream payload they are built from.

use serde::{Deserialize, Serialize};

use crate::sanitizer::{HtmlSanitizer, LinkifySanitizer, SanitizationError, Sanitizer};
use crate::{Tainted, Verified};

/// One search result, already sanitized.
///
/// Products only come out of [`ProductSanitizer::sanitize_item`], which
/// returns them as `Verified<Product>`; that is the only form a
/// [`ResultStore`](crate::ResultStore) accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Title with allow-listed markup and clickable links.
    pub title: String,
    /// `"<value> <currency>"`, sanitized.
    pub price: String,
    /// Item web URL, sanitized.
    pub url: String,
}

/// Search payload returned by the upstream API.
///
/// The upstream omits `itemSummaries` entirely when nothing matched, so a
/// missing list reads as zero items. Fields inside an item are required.
#[derive(Debug, Deserialize)]
pub struct SearchPayload {
    /// Matched items, in upstream order.
    #[serde(rename = "itemSummaries", default)]
    pub item_summaries: Vec<ItemSummary>,
}

/// A single item in the upstream payload.
#[derive(Debug, Deserialize)]
pub struct ItemSummary {
    /// Listing title, may contain markup.
    pub title: String,
    /// Listing price.
    pub price: ItemPrice,
    /// Link to the listing.
    #[serde(rename = "itemWebUrl")]
    pub item_web_url: String,
}

/// Upstream price: a decimal string plus an ISO currency code.
#[derive(Debug, Deserialize)]
pub struct ItemPrice {
    /// Amount, e.g. `"10.99"`.
    pub value: String,
    /// Currency code, e.g. `"USD"`.
    pub currency: String,
}

/// Builds verified products out of untrusted upstream items.
#[derive(Debug, Default)]
pub struct ProductSanitizer {
    title: LinkifySanitizer,
    text: HtmlSanitizer,
}

impl ProductSanitizer {
    /// Creates a product sanitizer using the default allow-list.
    pub fn new() -> Self {
        Self {
            title: LinkifySanitizer::new(),
            text: HtmlSanitizer::new(),
        }
    }

    /// Sanitizes every field of one upstream item.
    ///
    /// # Errors
    ///
    /// Returns `SanitizationError` if any field is rejected.
    pub fn sanitize_item(&self, item: ItemSummary) -> Result<Verified<Product>, SanitizationError> {
        let ItemSummary {
            title,
            price,
            item_web_url,
        } = item;

        let title = self.title.sanitize(Tainted::new(title))?;
        let price = self.text.sanitize(
            Tainted::new(price).map(|p| format!("{} {}", p.value, p.currency)),
        )?;
        let url = self.text.sanitize(Tainted::new(item_web_url))?;

        Ok(Verified::new_unchecked(Product {
            title: title.into_inner(),
            price: price.into_inner(),
            url: url.into_inner(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, value: &str, currency: &str, url: &str) -> ItemSummary {
        ItemSummary {
            title: title.to_string(),
            price: ItemPrice {
                value: value.to_string(),
                currency: currency.to_string(),
            },
            item_web_url: url.to_string(),
        }
    }

    #[test]
    fn builds_product_from_item() {
        let sanitizer = ProductSanitizer::new();

        let product = sanitizer
            .sanitize_item(item("<b>Phone</b>", "10", "USD", "http://x"))
            .expect("valid item")
            .into_inner();

        assert_eq!(product.title, "<b>Phone</b>");
        assert_eq!(product.price, "10 USD");
        assert_eq!(product.url, "http://x");
    }

    #[test]
    fn sanitizes_every_field() {
        let sanitizer = ProductSanitizer::new();

        let product = sanitizer
            .sanitize_item(item(
                "<div onclick=\"x()\">Case</div>",
                "<script>1</script>9.99",
                "EUR",
                "https://shop.example/item?a=1&b=2",
            ))
            .expect("valid item")
            .into_inner();

        assert_eq!(product.title, "Case");
        assert_eq!(product.price, "9.99 EUR");
        assert_eq!(product.url, "https://shop.example/item?a=1&amp;b=2");
    }

    #[test]
    fn payload_without_item_list_is_empty() {
        let payload: SearchPayload =
            serde_json::from_str(r#"{"total": 0, "limit": 10}"#).expect("valid payload");

        assert!(payload.item_summaries.is_empty());
    }

    #[test]
    fn payload_parses_upstream_field_names() {
        let payload: SearchPayload = serde_json::from_str(
            r#"{"itemSummaries": [{
                "itemId": "v1|1|0",
                "title": "Phone",
                "price": {"value": "10.00", "currency": "USD"},
                "itemWebUrl": "https://www.ebay.com/itm/1"
            }]}"#,
        )
        .expect("valid payload");

        assert_eq!(payload.item_summaries.len(), 1);
        assert_eq!(payload.item_summaries[0].price.currency, "USD");
        assert_eq!(payload.item_summaries[0].item_web_url, "https://www.ebay.com/itm/1");
    }

    #[test]
    fn payload_rejects_item_missing_price() {
        let result: Result<SearchPayload, _> = serde_json::from_str(
            r#"{"itemSummaries": [{"title": "Phone", "itemWebUrl": "http://x"}]}"#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn product_serializes_to_client_shape() {
        let product = Product {
            title: "Phone".to_string(),
            price: "10 USD".to_string(),
            url: "http://x".to_string(),
        };

        let json = serde_json::to_value(&product).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({"title": "Phone", "price": "10 USD", "url": "http://x"})
        );
    }
}
