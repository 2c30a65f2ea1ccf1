//! Cache adapter: positive/negative result namespaces plus circuit-breaker
//! state, backed by an in-process TTL cache.
//!
//! Grounded on the teacher's `link_index` in-memory index pattern, rebuilt
//! around `moka`'s async cache instead of a `DashMap` snapshot, since
//! positive/negative entries need per-entry TTL rather than a single
//! process-lifetime table.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::circuit_breaker::CircuitBreaker;
use crate::model::SearchResult;

pub const POSITIVE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
pub const NEGATIVE_TTL: Duration = Duration::from_secs(60);

/// `sha256(normalized primary query)`; the raw query is never used as a key.
pub fn cache_key(normalized_primary_query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_primary_query.as_bytes());
    hex::encode(hasher.finalize())
}

/// Abstracts a key-value store exposing positive results, negative markers,
/// and circuit-breaker state. Every operation degrades to a miss/no-op on
/// failure rather than surfacing an error to the request path.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    async fn get_positive(&self, key: &str) -> Option<SearchResult>;
    async fn set_positive(&self, key: &str, value: SearchResult);
    async fn get_negative(&self, key: &str) -> Option<String>;
    async fn set_negative(&self, key: &str, reason: String);
    fn breaker_open(&self, origin: &str) -> bool;
    fn breaker_trip(&self, origin: &str, duration: Duration);
    fn breaker_reset(&self, origin: &str);
}

/// In-process cache implementation. Stands in for a Redis-backed adapter in
/// this deployment; the trait boundary is where that swap would happen.
pub struct InMemoryCache {
    positive: Cache<String, SearchResult>,
    negative: Cache<String, String>,
    breaker: Arc<CircuitBreaker>,
}

impl InMemoryCache {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            positive: Cache::builder().time_to_live(POSITIVE_TTL).build(),
            negative: Cache::builder().time_to_live(NEGATIVE_TTL).build(),
            breaker,
        }
    }
}

#[async_trait]
impl CacheAdapter for InMemoryCache {
    async fn get_positive(&self, key: &str) -> Option<SearchResult> {
        self.positive.get(key).await
    }

    async fn set_positive(&self, key: &str, value: SearchResult) {
        self.positive.insert(key.to_string(), value).await;
    }

    async fn get_negative(&self, key: &str) -> Option<String> {
        self.negative.get(key).await
    }

    async fn set_negative(&self, key: &str, reason: String) {
        self.negative.insert(key.to_string(), reason).await;
    }

    fn breaker_open(&self, origin: &str) -> bool {
        !self.breaker.should_attempt(origin)
    }

    fn breaker_trip(&self, origin: &str, duration: Duration) {
        warn!(origin, ?duration, "tripping circuit breaker");
        self.breaker.force_open(origin, duration);
    }

    fn breaker_reset(&self, origin: &str) {
        self.breaker.force_close(origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SearchResult as SR};

    #[test]
    fn cache_key_is_stable_sha256() {
        let a = cache_key("galaxy s24 ultra");
        let b = cache_key("galaxy s24 ultra");
        let c = cache_key("galaxy s24");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn positive_round_trip() {
        let breaker = Arc::new(CircuitBreaker::new(3, 1, Duration::from_secs(60)));
        let cache = InMemoryCache::new(breaker);
        let key = cache_key("galaxy s24");
        assert!(cache.get_positive(&key).await.is_none());
        cache.set_positive(&key, SR::NotFound { elapsed_ms: 1, from_negative_cache: false }).await;
        assert!(cache.get_positive(&key).await.is_some());
    }

    #[tokio::test]
    async fn negative_round_trip() {
        let breaker = Arc::new(CircuitBreaker::new(3, 1, Duration::from_secs(60)));
        let cache = InMemoryCache::new(breaker);
        let key = cache_key("unknown gadget");
        assert!(cache.get_negative(&key).await.is_none());
        cache.set_negative(&key, "no results".to_string()).await;
        assert_eq!(cache.get_negative(&key).await.as_deref(), Some("no results"));
    }

    #[test]
    fn breaker_trips_and_resets() {
        let breaker = Arc::new(CircuitBreaker::new(3, 1, Duration::from_secs(60)));
        let cache = InMemoryCache::new(breaker);
        assert!(!cache.breaker_open("aggregator.example.com"));
        cache.breaker_trip("aggregator.example.com", Duration::from_secs(60));
        assert!(cache.breaker_open("aggregator.example.com"));
        cache.breaker_reset("aggregator.example.com");
        assert!(!cache.breaker_open("aggregator.example.com"));
    }
}
