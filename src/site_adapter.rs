//! Site adapter contract: the aggregator-specific DOM selectors and HTML
//! extraction logic, shared between FastPath (static HTML) and SlowPath
//! (rendered HTML from a live page) so the two paths never carry two copies
//! of the same selector logic.
//!
//! Grounded on the teacher's `scraper::{Html, Selector}` extraction idiom
//! (`page_extractor`/`content_saver` used `static X_SELECTOR: LazyLock<Selector>`
//! to parse selectors once) plus its safe-accessor pattern for untrusted DOM
//! data.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::model::Offer;

/// A stub line item parsed off the list page: just enough to pick a winner
/// and build the detail URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingStub {
    pub product_id: String,
    pub product_name: String,
    pub detail_url: String,
}

/// The fully parsed detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailPage {
    pub product_name: String,
    pub offers: Vec<Offer>,
}

/// Implemented once per aggregator surface. The FastPath and SlowPath
/// executors both call into the same adapter; SlowPath just gets its HTML
/// from `page.content()` after the browser has rendered the page instead of
/// from a raw HTTP response body.
pub trait SiteAdapter: Send + Sync {
    fn search_url(&self, query: &str) -> String;
    fn detail_url(&self, product_id: &str) -> String;

    /// Parse a rendered/fetched list page and pick the best-matching stub,
    /// or `None` if the page has zero matches.
    fn parse_list(&self, html: &str) -> Option<ListingStub>;

    /// Parse a rendered/fetched detail page into the top-N offers
    /// (caller truncates to 3); `None` if the required DOM structure is
    /// missing (site template drift).
    fn parse_detail(&self, html: &str) -> Option<DetailPage>;

    /// Whether the body looks like an anti-bot interstitial rather than a
    /// real page (used by FastPath's `Blocked` detection and SlowPath's
    /// DOM-based block detection).
    fn looks_blocked(&self, html: &str) -> bool;
}

/// Safe-get helper: parse a price string by stripping non-digits, range
/// checking against `[0, 10^9]`. Malformed strings return `None` (the
/// offer is dropped, not the request).
pub fn safe_price(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let price: i64 = digits.parse().ok()?;
    if (0..=1_000_000_000).contains(&price) {
        Some(price)
    } else {
        None
    }
}

/// Safe-get helper: validate an extracted URL has an allowed scheme before
/// inclusion; returns `None` rather than a malformed link.
pub fn safe_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    if matches!(url.scheme(), "http" | "https") {
        Some(url.to_string())
    } else {
        None
    }
}

/// Safe-get helper: first matching element's trimmed text, or an empty
/// string default.
pub fn safe_text(el: &ElementRef, selector: &Selector) -> String {
    el.select(selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Reference site adapter used by tests and as a template for a real
/// aggregator integration: a minimal, stable HTML shape documented below so
/// tests can construct fixtures without a live site.
///
/// List page shape: `div.product[data-id][data-href] > span.name`.
/// Detail page shape: `h1.product-name` plus `div.offer[data-mall][data-price]
/// [data-link] span.delivery`, one per seller, with an optional
/// `[data-free-shipping="true"]` attribute.
pub struct ReferenceAdapter {
    base_url: String,
}

static PRODUCT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.product").unwrap());
static PRODUCT_NAME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.name").unwrap());
static DETAIL_NAME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1.product-name").unwrap());
static OFFER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.offer").unwrap());
static DELIVERY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.delivery").unwrap());
static BLOCKED_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.antibot-challenge").unwrap());

impl ReferenceAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

impl SiteAdapter for ReferenceAdapter {
    fn search_url(&self, query: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        format!("{}/search?q={}", self.base_url, encoded)
    }

    fn detail_url(&self, product_id: &str) -> String {
        format!("{}/product/{}", self.base_url, product_id)
    }

    fn parse_list(&self, html: &str) -> Option<ListingStub> {
        let doc = Html::parse_document(html);
        let element = doc.select(&PRODUCT_SELECTOR).next()?;
        let product_id = element.value().attr("data-id")?.to_string();
        let detail_url = element.value().attr("data-href").and_then(safe_url)?;
        let product_name = safe_text(&element, &PRODUCT_NAME_SELECTOR);
        Some(ListingStub { product_id, product_name, detail_url })
    }

    fn parse_detail(&self, html: &str) -> Option<DetailPage> {
        let doc = Html::parse_document(html);
        let name_el = doc.select(&DETAIL_NAME_SELECTOR).next()?;
        let product_name = name_el.text().collect::<String>().trim().to_string();

        let mut offers: Vec<Offer> = doc
            .select(&OFFER_SELECTOR)
            .filter_map(|el| {
                let mall = el.value().attr("data-mall")?.to_string();
                let price = el.value().attr("data-price").and_then(safe_price)?;
                let link = el.value().attr("data-link").and_then(safe_url)?;
                let free_shipping = el.value().attr("data-free-shipping") == Some("true");
                let delivery = safe_text(&el, &DELIVERY_SELECTOR);
                Some(Offer { rank: 0, mall, price, free_shipping, delivery, link })
            })
            .collect();

        if offers.is_empty() {
            return None;
        }

        offers.sort_by_key(|o| o.price);
        for (i, offer) in offers.iter_mut().enumerate() {
            offer.rank = (i + 1) as u8;
        }
        offers.truncate(3);

        Some(DetailPage { product_name, offers })
    }

    fn looks_blocked(&self, html: &str) -> bool {
        let doc = Html::parse_document(html);
        doc.select(&BLOCKED_SELECTOR).next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_HTML: &str = r#"
        <html><body>
            <div class="product" data-id="P123" data-href="https://aggregator.example.com/product/P123">
                <span class="name">Samsung Galaxy S24 Ultra</span>
            </div>
        </body></html>
    "#;

    const DETAIL_HTML: &str = r#"
        <html><body>
            <h1 class="product-name">Samsung Galaxy S24 Ultra</h1>
            <div class="offer" data-mall="MallA" data-price="1,290,000" data-link="https://aggregator.example.com/go/a" data-free-shipping="true">
                <span class="delivery">Tomorrow</span>
            </div>
            <div class="offer" data-mall="MallB" data-price="1,250,000won" data-link="https://aggregator.example.com/go/b">
                <span class="delivery">2 days</span>
            </div>
        </body></html>
    "#;

    #[test]
    fn parses_list_page_stub() {
        let adapter = ReferenceAdapter::new("https://aggregator.example.com");
        let stub = adapter.parse_list(LIST_HTML).expect("stub");
        assert_eq!(stub.product_id, "P123");
        assert_eq!(stub.product_name, "Samsung Galaxy S24 Ultra");
    }

    #[test]
    fn parses_detail_page_and_sorts_offers_ascending() {
        let adapter = ReferenceAdapter::new("https://aggregator.example.com");
        let detail = adapter.parse_detail(DETAIL_HTML).expect("detail");
        assert_eq!(detail.offers.len(), 2);
        assert_eq!(detail.offers[0].mall, "MallB");
        assert_eq!(detail.offers[0].price, 1_250_000);
        assert_eq!(detail.offers[0].rank, 1);
        assert_eq!(detail.offers[1].rank, 2);
    }

    #[test]
    fn missing_list_match_returns_none() {
        let adapter = ReferenceAdapter::new("https://aggregator.example.com");
        assert!(adapter.parse_list("<html><body></body></html>").is_none());
    }

    #[test]
    fn safe_price_rejects_out_of_range() {
        assert_eq!(safe_price("10,000,000,000"), None);
        assert_eq!(safe_price("won"), None);
        assert_eq!(safe_price("1,290,000"), Some(1_290_000));
    }

    #[test]
    fn safe_url_rejects_non_http_scheme() {
        assert_eq!(safe_url("javascript:alert(1)"), None);
        assert_eq!(safe_url("https://example.com/x").as_deref(), Some("https://example.com/x"));
    }

    #[test]
    fn looks_blocked_detects_antibot_page() {
        let adapter = ReferenceAdapter::new("https://aggregator.example.com");
        assert!(adapter.looks_blocked(r#"<html><body><div class="antibot-challenge"></div></body></html>"#));
        assert!(!adapter.looks_blocked(LIST_HTML));
    }
}
