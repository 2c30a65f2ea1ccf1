//! FastPath executor: HTTP + static HTML extraction against the aggregator,
//! no browser involved.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::CacheAdapter;
use crate::error::FastPathError;
use crate::model::{Offer, Source, SuccessPayload};
use crate::site_adapter::SiteAdapter;

/// After this many consecutive `Blocked`/`Timeout` results against the
/// origin, the breaker opens for `BREAKER_OPEN_DURATION`.
const BREAKER_TRIP_THRESHOLD: u32 = 3;
const BREAKER_OPEN_DURATION: Duration = Duration::from_secs(60);

pub struct FastPathExecutor {
    client: reqwest::Client,
    adapter: Arc<dyn SiteAdapter>,
    cache: Arc<dyn CacheAdapter>,
    origin: String,
    consecutive_failures: AtomicU32,
}

impl FastPathExecutor {
    pub fn new(user_agent: &str, adapter: Arc<dyn SiteAdapter>, cache: Arc<dyn CacheAdapter>, origin: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .expect("static reqwest client config is always valid");
        Self {
            client,
            adapter,
            cache,
            origin,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Whether the breaker for this origin currently blocks FastPath
    /// attempts entirely.
    pub fn breaker_open(&self) -> bool {
        self.cache.breaker_open(&self.origin)
    }

    /// Run one candidate search to completion or `deadline`, whichever
    /// comes first.
    pub async fn search(&self, candidate: &str, deadline: Duration) -> Result<SuccessPayload, FastPathError> {
        match tokio::time::timeout(deadline, self.search_inner(candidate)).await {
            Ok(result) => {
                self.record_outcome(&result);
                result
            }
            Err(_) => {
                self.record_outcome(&Err(FastPathError::Timeout));
                Err(FastPathError::Timeout)
            }
        }
    }

    async fn search_inner(&self, candidate: &str) -> Result<SuccessPayload, FastPathError> {
        let list_html = self.fetch(&self.adapter.search_url(candidate)).await?;
        if self.adapter.looks_blocked(&list_html) {
            return Err(FastPathError::Blocked("list page anti-bot signature".into()));
        }
        let stub = self.adapter.parse_list(&list_html).ok_or(FastPathError::ProductNotFound)?;

        let detail_html = self.fetch(&stub.detail_url).await?;
        if self.adapter.looks_blocked(&detail_html) {
            return Err(FastPathError::Blocked("detail page anti-bot signature".into()));
        }
        let detail = self.adapter.parse_detail(&detail_html).ok_or(FastPathError::Parse("detail DOM missing".into()))?;

        build_payload(stub.product_id, detail.product_name, detail.offers, Source::Fastpath)
    }

    async fn fetch(&self, url: &str) -> Result<String, FastPathError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FastPathError::Network(e.to_string()))?;

        if matches!(response.status().as_u16(), 429 | 403) {
            return Err(FastPathError::Blocked(format!("status {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(FastPathError::Network(format!("unexpected status {}", response.status())));
        }

        response.text().await.map_err(|e| FastPathError::Network(e.to_string()))
    }

    fn record_outcome(&self, result: &Result<SuccessPayload, FastPathError>) {
        match result {
            Ok(_) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.cache.breaker_reset(&self.origin);
            }
            Err(FastPathError::Blocked(_)) | Err(FastPathError::Timeout) => {
                let count = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= BREAKER_TRIP_THRESHOLD {
                    warn!(origin = %self.origin, count, "FastPath breaker tripped");
                    self.cache.breaker_trip(&self.origin, BREAKER_OPEN_DURATION);
                }
            }
            Err(_) => {
                debug!(origin = %self.origin, "FastPath non-breaker-tripping error");
            }
        }
    }
}

pub(crate) fn build_payload(
    product_id: String,
    product_name: String,
    offers: Vec<Offer>,
    source: Source,
) -> Result<SuccessPayload, FastPathError> {
    let best = offers.first().cloned().ok_or(FastPathError::ProductNotFound)?;
    Ok(SuccessPayload {
        product_id: Some(product_id),
        product_name,
        lowest_price: best.price,
        link: best.link.clone(),
        mall: Some(best.mall.clone()),
        free_shipping: Some(best.free_shipping),
        top_offers: offers,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreaker;
    use crate::cache::InMemoryCache;
    use crate::site_adapter::ReferenceAdapter;

    fn make_executor(base_url: &str) -> FastPathExecutor {
        let breaker = Arc::new(CircuitBreaker::new(3, 1, Duration::from_secs(60)));
        let cache: Arc<dyn CacheAdapter> = Arc::new(InMemoryCache::new(breaker));
        let adapter: Arc<dyn SiteAdapter> = Arc::new(ReferenceAdapter::new(base_url.to_string()));
        FastPathExecutor::new("test-agent/1.0", adapter, cache, "aggregator.example.com".to_string())
    }

    #[tokio::test]
    async fn product_not_found_when_list_page_empty() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", mockito::Matcher::Regex(r"^/search".into()))
            .with_status(200)
            .with_body("<html><body></body></html>")
            .create_async()
            .await;
        let executor = make_executor(&server.url());
        let result = executor.search("galaxy s24", Duration::from_secs(2)).await;
        assert_eq!(result, Err(FastPathError::ProductNotFound));
    }

    #[tokio::test]
    async fn blocked_status_trips_breaker_after_threshold() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", mockito::Matcher::Regex(r"^/search".into()))
            .with_status(403)
            .create_async()
            .await;
        let executor = make_executor(&server.url());
        for _ in 0..3 {
            let result = executor.search("galaxy s24", Duration::from_secs(2)).await;
            assert!(matches!(result, Err(FastPathError::Blocked(_))));
        }
        assert!(executor.breaker_open());
    }
}
