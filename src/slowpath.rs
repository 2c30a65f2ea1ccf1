//! SlowPath executor: same contract as FastPath, driven through a pooled
//! headless browser for cases where the HTML path is blocked, dynamic, or
//! parsing-broken.
//!
//! Grounded on the teacher's `crawl_engine::page_processor` navigate/wait
//! sequence, rebuilt around a single page leased for one list+detail run
//! instead of one page per crawl frontier item.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::browser_pool::BrowserPool;
use crate::cache::CacheAdapter;
use crate::error::SlowPathError;
use crate::fastpath::build_payload;
use crate::model::{Source, SuccessPayload};
use crate::site_adapter::SiteAdapter;

const BREAKER_TRIP_THRESHOLD: u32 = 3;
const BREAKER_OPEN_DURATION: Duration = Duration::from_secs(60);

pub struct SlowPathExecutor {
    pool: Arc<BrowserPool>,
    adapter: Arc<dyn SiteAdapter>,
    cache: Arc<dyn CacheAdapter>,
    origin: String,
    consecutive_failures: AtomicU32,
}

impl SlowPathExecutor {
    pub fn new(pool: Arc<BrowserPool>, adapter: Arc<dyn SiteAdapter>, cache: Arc<dyn CacheAdapter>, origin: String) -> Self {
        Self {
            pool,
            adapter,
            cache,
            origin,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn breaker_open(&self) -> bool {
        self.cache.breaker_open(&self.origin)
    }

    /// Run one candidate search to completion or `deadline`, whichever comes
    /// first. Every exit path releases the leased page: a clean `Timeout`
    /// returns it to the pool, a `BrowserCrash` discards it.
    pub async fn search(&self, candidate: &str, deadline: Duration) -> Result<SuccessPayload, SlowPathError> {
        let guard = match self.pool.acquire().await {
            Ok(guard) => guard,
            Err(e) => return Err(SlowPathError::BrowserCrash(e.to_string())),
        };

        let result = match tokio::time::timeout(deadline, self.run(&guard, candidate)).await {
            Ok(result) => result,
            Err(_) => Err(SlowPathError::Timeout),
        };

        match &result {
            Err(SlowPathError::BrowserCrash(_)) => guard.discard(),
            _ => drop(guard),
        }

        self.record_outcome(&result);
        result
    }

    async fn run(&self, guard: &crate::browser_pool::PooledBrowserGuard, candidate: &str) -> Result<SuccessPayload, SlowPathError> {
        let browser = guard.browser();
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SlowPathError::BrowserCrash(e.to_string()))?;

        let list_result: Result<SuccessPayload, SlowPathError> = async {
            page.goto(&self.adapter.search_url(candidate))
                .await
                .map_err(|e| SlowPathError::BrowserCrash(e.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| SlowPathError::BrowserCrash(e.to_string()))?;

            let list_html = page.content().await.map_err(|e| SlowPathError::BrowserCrash(e.to_string()))?;
            if self.adapter.looks_blocked(&list_html) {
                return Err(SlowPathError::Blocked("list page anti-bot signature".into()));
            }
            let stub = self.adapter.parse_list(&list_html).ok_or(SlowPathError::ProductNotFound)?;

            page.goto(&stub.detail_url)
                .await
                .map_err(|e| SlowPathError::BrowserCrash(e.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| SlowPathError::BrowserCrash(e.to_string()))?;

            let detail_html = page.content().await.map_err(|e| SlowPathError::BrowserCrash(e.to_string()))?;
            if self.adapter.looks_blocked(&detail_html) {
                return Err(SlowPathError::Blocked("detail page anti-bot signature".into()));
            }
            let detail = self
                .adapter
                .parse_detail(&detail_html)
                .ok_or(SlowPathError::Parse("detail DOM missing".into()))?;

            build_payload(stub.product_id, detail.product_name, detail.offers, Source::Slowpath)
                .map_err(|_| SlowPathError::ProductNotFound)
        }
        .await;

        if let Err(e) = page.close().await {
            warn!(error = %e, "failed to close SlowPath page cleanly");
        }

        list_result
    }

    fn record_outcome(&self, result: &Result<SuccessPayload, SlowPathError>) {
        match result {
            Ok(_) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.cache.breaker_reset(&self.origin);
            }
            Err(SlowPathError::Blocked(_)) | Err(SlowPathError::Timeout) => {
                let count = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= BREAKER_TRIP_THRESHOLD {
                    warn!(origin = %self.origin, count, "SlowPath breaker tripped");
                    self.cache.breaker_trip(&self.origin, BREAKER_OPEN_DURATION);
                }
            }
            Err(_) => {}
        }
    }
}
