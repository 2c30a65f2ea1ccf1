//! Request/response data model shared across the pipeline: `Query`, `Offer`,
//! `SearchResult`, and the durable `FailureRecord`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Immutable input bundle created by the HTTP adapter and consumed by the
/// orchestrator. Never mutated once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub product_name: String,
    pub current_price: Option<i64>,
    pub current_url: Option<String>,
    pub product_code: Option<String>,
}

impl Query {
    /// Validate the raw fields the HTTP adapter must reject before the
    /// orchestrator ever sees them.
    pub fn validate(&self) -> Result<(), EngineError> {
        let len = self.product_name.chars().count();
        if len == 0 || len > 500 {
            return Err(EngineError::InvalidInput(
                "product_name must be 1..500 characters".into(),
            ));
        }
        if contains_script_injection(&self.product_name) {
            return Err(EngineError::InvalidInput(
                "product_name contains disallowed markup".into(),
            ));
        }
        if let Some(price) = self.current_price
            && !(0..=1_000_000_000).contains(&price)
        {
            return Err(EngineError::InvalidInput(
                "current_price must be within 0..=1_000_000_000".into(),
            ));
        }
        if let Some(url) = &self.current_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(EngineError::InvalidInput(
                "current_url must use http or https".into(),
            ));
        }
        Ok(())
    }
}

fn contains_script_injection(s: &str) -> bool {
    let lowered = s.to_lowercase();
    s.contains('<') || s.contains('>') || lowered.contains("<script") || lowered.contains("javascript:")
}

/// Product category detected by the normalizer, used by the Validation Gate
/// compatibility check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Phone,
    Laptop,
    Audio,
    Food,
    Appliance,
    Other,
}

/// One seller's listing, rank 1-based, sorted ascending by price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Offer {
    pub rank: u8,
    pub mall: String,
    pub price: i64,
    pub free_shipping: bool,
    pub delivery: String,
    pub link: String,
}

/// Which stage produced a successful result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Fastpath,
    Slowpath,
}

/// The outcome of a single successful search against the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuccessPayload {
    pub product_id: Option<String>,
    pub product_name: String,
    pub lowest_price: i64,
    pub link: String,
    pub top_offers: Vec<Offer>,
    pub mall: Option<String>,
    pub free_shipping: Option<bool>,
    pub source: Source,
}

impl SuccessPayload {
    /// Enforce the invariant that `lowest_price`/`link` mirror the best
    /// offer, and that offers are rank-ordered, ascending by price.
    pub fn is_consistent(&self) -> bool {
        match self.top_offers.first() {
            Some(best) => self.lowest_price == best.price && self.link == best.link,
            None => false,
        }
    }
}

/// Tagged outcome of the whole pipeline, returned by the orchestrator and
/// mapped to an HTTP response by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status")]
pub enum SearchResult {
    Success {
        #[serde(flatten)]
        payload: SuccessPayload,
        elapsed_ms: u64,
    },
    Timeout { elapsed_ms: u64 },
    ParseError { elapsed_ms: u64 },
    Blocked { elapsed_ms: u64 },
    NoResults { elapsed_ms: u64 },
    BudgetExhausted { elapsed_ms: u64 },
    NotFound { elapsed_ms: u64, from_negative_cache: bool },
}

impl SearchResult {
    pub fn elapsed_ms(&self) -> u64 {
        match self {
            SearchResult::Success { elapsed_ms, .. }
            | SearchResult::Timeout { elapsed_ms }
            | SearchResult::ParseError { elapsed_ms }
            | SearchResult::Blocked { elapsed_ms }
            | SearchResult::NoResults { elapsed_ms }
            | SearchResult::BudgetExhausted { elapsed_ms }
            | SearchResult::NotFound { elapsed_ms, .. } => *elapsed_ms,
        }
    }

    /// Re-tag a cached payload as a cache hit, stamping the current
    /// request's own elapsed time rather than the stale value saved when the
    /// entry was first written.
    pub fn relabel_as_cache_hit(mut self, elapsed_ms: u64) -> Self {
        if let SearchResult::Success { payload, elapsed_ms: stored, .. } = &mut self {
            payload.source = Source::Cache;
            *stored = elapsed_ms;
        }
        self
    }

    /// Whether this outcome should produce a positive-cache write.
    pub fn is_success(&self) -> bool {
        matches!(self, SearchResult::Success { .. })
    }

    /// Only terminal `NotFound` writes a negative cache entry; `Timeout`,
    /// `Blocked`, and `BudgetExhausted` are transient and must not.
    pub fn is_negative_cacheable(&self) -> bool {
        matches!(self, SearchResult::NotFound { from_negative_cache: false, .. })
    }
}

/// Status of a persisted failure record, mutated only by the external
/// analytics/curation interface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureStatus {
    Pending,
    ManualFixed,
    AutoLearned,
    NotProduct,
}

/// A durable row describing one terminal pipeline failure, used to improve
/// the normalization rule tables over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: i64,
    pub original_query: String,
    pub normalized_query: String,
    pub candidates: Vec<String>,
    pub attempted_count: i64,
    pub error_message: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub status: FailureStatus,
    pub correct_name: Option<String>,
    pub correct_product_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlong_product_name() {
        let query = Query {
            product_name: "x".repeat(501),
            current_price: None,
            current_url: None,
            product_code: None,
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn rejects_script_injection() {
        let query = Query {
            product_name: "<script>alert(1)</script>".to_string(),
            current_price: None,
            current_url: None,
            product_code: None,
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn rejects_non_http_url() {
        let query = Query {
            product_name: "galaxy s24".to_string(),
            current_price: None,
            current_url: Some("ftp://example.com".to_string()),
            product_code: None,
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn success_payload_consistency_invariant() {
        let offer = Offer {
            rank: 1,
            mall: "example mall".to_string(),
            price: 1000,
            free_shipping: true,
            delivery: "2 days".to_string(),
            link: "https://example.com/x".to_string(),
        };
        let payload = SuccessPayload {
            product_id: Some("abc".into()),
            product_name: "Galaxy S24".into(),
            lowest_price: 1000,
            link: "https://example.com/x".into(),
            top_offers: vec![offer],
            mall: Some("example mall".into()),
            free_shipping: Some(true),
            source: Source::Fastpath,
        };
        assert!(payload.is_consistent());
    }

    #[test]
    fn only_clean_not_found_is_negative_cacheable() {
        let clean = SearchResult::NotFound { elapsed_ms: 10, from_negative_cache: false };
        let from_cache = SearchResult::NotFound { elapsed_ms: 10, from_negative_cache: true };
        assert!(clean.is_negative_cacheable());
        assert!(!from_cache.is_negative_cacheable());
        assert!(!SearchResult::Timeout { elapsed_ms: 10 }.is_negative_cacheable());
    }
}
