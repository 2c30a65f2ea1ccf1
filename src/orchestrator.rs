//! The per-request pipeline: validate → normalize → cache → FastPath →
//! SlowPath → validate → write → respond, all under a single `Budget`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::budget::{Budget, Stage};
use crate::cache::{cache_key, CacheAdapter};
use crate::config::EngineConfig;
use crate::error::{EngineError, FastPathError, SlowPathError};
use crate::failure_recorder::FailureRecorder;
use crate::fastpath::FastPathExecutor;
use crate::model::{Query, SearchResult, SuccessPayload};
use crate::normalizer::{NormalizedQuery, Normalizer};
use crate::slowpath::SlowPathExecutor;
use crate::validation_gate::ValidationGate;

/// A query of two tokens or fewer containing one of these counts as broad:
/// FastPath gets the whole search budget and SlowPath is disabled.
const BROAD_QUERY_KEYWORDS: &[&str] = &["아이폰", "갤럭시", "iphone", "galaxy", "macbook", "노트북"];

pub struct Orchestrator {
    config: Arc<EngineConfig>,
    cache: Arc<dyn CacheAdapter>,
    fastpath: Arc<FastPathExecutor>,
    slowpath: Arc<SlowPathExecutor>,
    failure_recorder: Arc<FailureRecorder>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<EngineConfig>,
        cache: Arc<dyn CacheAdapter>,
        fastpath: Arc<FastPathExecutor>,
        slowpath: Arc<SlowPathExecutor>,
        failure_recorder: Arc<FailureRecorder>,
    ) -> Self {
        Self { config, cache, fastpath, slowpath, failure_recorder }
    }

    pub async fn handle(&self, query: Query) -> Result<SearchResult, EngineError> {
        query.validate()?;

        let mut budget = Budget::start(self.config.budget);

        let resources = &self.config.resources;
        let normalizer = Normalizer::new(
            &resources.hard_mapping,
            &resources.synonyms,
            &resources.accessory_tokens,
            &resources.category_keywords,
            &resources.brand_lexicon,
        );
        let normalized = normalizer.normalize(&query.product_name);
        debug!(?normalized, "normalized query");

        if is_broad_query(&normalized) {
            budget.mark_broad_query();
        }

        let key = cache_key(&normalized.primary);

        if budget.can_run(Stage::Cache) {
            if let Some(hit) = self.cache.get_positive(&key).await {
                let elapsed_ms = budget.elapsed().as_millis() as u64;
                info!(elapsed_ms, "positive cache hit");
                return Ok(hit.relabel_as_cache_hit(elapsed_ms));
            }
            if let Some(_reason) = self.cache.get_negative(&key).await {
                return Ok(SearchResult::NotFound {
                    elapsed_ms: budget.elapsed().as_millis() as u64,
                    from_negative_cache: true,
                });
            }
        }

        let validation_gate = ValidationGate::new(&resources.category_keywords, &resources.brand_lexicon);

        let (outcome, attempted) = self
            .run_pipeline(&query, &normalized, &mut budget, &validation_gate)
            .await;

        match &outcome {
            Ok(payload) => {
                let result = SearchResult::Success {
                    payload: payload.clone(),
                    elapsed_ms: budget.elapsed().as_millis() as u64,
                };
                self.cache.set_positive(&key, result.clone()).await;
                Ok(result)
            }
            Err(PipelineFailure::NotFound) => {
                let result = SearchResult::NotFound {
                    elapsed_ms: budget.elapsed().as_millis() as u64,
                    from_negative_cache: false,
                };
                self.cache.set_negative(&key, "no candidate produced a valid result".to_string()).await;
                self.log_failure(&query, &normalized, attempted, "no candidate produced a valid result".to_string());
                Ok(result)
            }
            Err(PipelineFailure::Timeout) => {
                self.log_failure(&query, &normalized, attempted, "budget exhausted before a candidate succeeded".to_string());
                Ok(SearchResult::Timeout { elapsed_ms: budget.elapsed().as_millis() as u64 })
            }
            Err(PipelineFailure::Blocked) => {
                self.log_failure(&query, &normalized, attempted, "blocked on every attempted candidate".to_string());
                Ok(SearchResult::Blocked { elapsed_ms: budget.elapsed().as_millis() as u64 })
            }
            Err(PipelineFailure::BudgetExhausted) => {
                Ok(SearchResult::BudgetExhausted { elapsed_ms: budget.elapsed().as_millis() as u64 })
            }
        }
    }

    async fn run_pipeline(
        &self,
        query: &Query,
        normalized: &NormalizedQuery,
        budget: &mut Budget,
        gate: &ValidationGate<'_>,
    ) -> (Result<SuccessPayload, PipelineFailure>, usize) {
        if budget.is_exhausted() {
            return (Err(PipelineFailure::BudgetExhausted), 0);
        }

        let mut attempted = 0usize;
        let mut saw_blocked = false;
        let mut saw_timeout = false;

        // Level 0/1 candidates are accepted unconditionally: no gate.
        if let Some(outcome) = self
            .search_tier(query, &normalized.candidates, None, budget, &mut attempted, &mut saw_blocked, &mut saw_timeout)
            .await
        {
            return (outcome, attempted);
        }

        // Level 2 fallback is only consulted once Level 0/1 yielded no
        // success, and every candidate it emits is a meaning-reduction that
        // must pass the Validation Gate.
        if !normalized.is_hard_mapped && !normalized.fallback_candidates.is_empty()
            && let Some(outcome) = self
                .search_tier(query, &normalized.fallback_candidates, Some(gate), budget, &mut attempted, &mut saw_blocked, &mut saw_timeout)
                .await
        {
            return (outcome, attempted);
        }

        if saw_blocked {
            (Err(PipelineFailure::Blocked), attempted)
        } else if saw_timeout {
            (Err(PipelineFailure::Timeout), attempted)
        } else {
            (Err(PipelineFailure::NotFound), attempted)
        }
    }

    /// Run FastPath then SlowPath over one tier's candidate list. Returns
    /// `Some(Ok(..))` on a successful, gate-passing result, `Some(Err(..))`
    /// on a terminal failure that should stop the whole pipeline (budget ran
    /// out before SlowPath could start), or `None` to fall through to the
    /// next tier (or to the final blocked/timeout/not-found classification).
    #[allow(clippy::too_many_arguments)]
    async fn search_tier(
        &self,
        query: &Query,
        candidates: &[String],
        gate: Option<&ValidationGate<'_>>,
        budget: &mut Budget,
        attempted: &mut usize,
        saw_blocked: &mut bool,
        saw_timeout: &mut bool,
    ) -> Option<Result<SuccessPayload, PipelineFailure>> {
        if candidates.is_empty() {
            return None;
        }

        let accept = |payload: &SuccessPayload| gate.is_none_or(|g| g.accept(&query.product_name, payload));

        let mut tier_saw_timeout = false;
        if budget.can_run(Stage::FastPath) && !self.fastpath.breaker_open() {
            let remaining_candidates = candidates.len().max(1);
            for (i, candidate) in candidates.iter().enumerate() {
                if !budget.can_run(Stage::FastPath) {
                    break;
                }
                *attempted += 1;
                let slice = remaining_candidates.saturating_sub(i).max(1);
                let deadline = fair_share(budget.timeout_for(Stage::FastPath), slice);
                match self.fastpath.search(candidate, deadline).await {
                    Ok(payload) => {
                        if accept(&payload) {
                            return Some(Ok(payload));
                        }
                        debug!(candidate, "FastPath result rejected by validation gate");
                    }
                    Err(FastPathError::Blocked(_)) => {
                        *saw_blocked = true;
                        break; // Blocked is not retried at FastPath; advance to SlowPath.
                    }
                    Err(FastPathError::Parse(_)) => {
                        break; // Parse is not retried at FastPath; advance to SlowPath.
                    }
                    Err(FastPathError::Timeout) => {
                        tier_saw_timeout = true;
                        *saw_timeout = true;
                    }
                    Err(_) => {}
                }
            }
        }

        if tier_saw_timeout && budget.remaining() < budget.timeout_for(Stage::SlowPath) {
            return Some(Err(PipelineFailure::Timeout));
        }

        if self.config.slowpath_enabled && budget.can_run(Stage::SlowPath) && !self.slowpath.breaker_open() {
            let remaining_candidates = candidates.len().max(1);
            for (i, candidate) in candidates.iter().enumerate() {
                if !budget.can_run(Stage::SlowPath) {
                    break;
                }
                *attempted += 1;
                let slice = remaining_candidates.saturating_sub(i).max(1);
                let deadline = fair_share(budget.timeout_for(Stage::SlowPath), slice);
                match self.slowpath.search(candidate, deadline).await {
                    Ok(payload) => {
                        if accept(&payload) {
                            return Some(Ok(payload));
                        }
                        debug!(candidate, "SlowPath result rejected by validation gate");
                    }
                    Err(SlowPathError::Blocked(_)) => {
                        *saw_blocked = true;
                    }
                    Err(SlowPathError::Timeout) => {
                        *saw_timeout = true;
                    }
                    Err(SlowPathError::BrowserCrash(e)) => {
                        warn!(error = %e, "SlowPath browser crash, trying next candidate");
                    }
                    Err(_) => {}
                }
            }
        }

        None
    }

    fn log_failure(&self, query: &Query, normalized: &NormalizedQuery, attempted: usize, error_message: String) {
        self.failure_recorder.record(crate::failure_recorder::PendingFailure {
            original_query: query.product_name.clone(),
            normalized_query: normalized.primary.clone(),
            candidates: normalized.candidates.clone(),
            attempted_count: attempted as i64,
            error_message,
            category: None,
            brand: None,
            model: None,
        });
    }
}

enum PipelineFailure {
    NotFound,
    Timeout,
    Blocked,
    BudgetExhausted,
}

/// A single candidate's search runs under `min(remaining, stage_default /
/// ceil(remaining_candidates))` so a single slow candidate cannot starve the
/// others.
fn fair_share(stage_budget: Duration, remaining_candidates: usize) -> Duration {
    stage_budget / (remaining_candidates as u32).max(1)
}

/// Broad-query rule: normalized primary is at most two whitespace tokens
/// and contains one of the broad keywords.
fn is_broad_query(normalized: &NormalizedQuery) -> bool {
    let tokens: Vec<&str> = normalized.primary.split_whitespace().collect();
    tokens.len() <= 2 && BROAD_QUERY_KEYWORDS.iter().any(|kw| normalized.primary.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NormalizedQuery;

    #[test]
    fn broad_query_detection() {
        let broad = NormalizedQuery {
            primary: "아이폰".to_string(),
            candidates: vec!["아이폰".to_string()],
            fallback_candidates: vec![],
            is_hard_mapped: false,
        };
        let narrow = NormalizedQuery {
            primary: "samsung galaxy s24 ultra".to_string(),
            candidates: vec!["samsung galaxy s24 ultra".to_string()],
            fallback_candidates: vec![],
            is_hard_mapped: false,
        };
        assert!(is_broad_query(&broad));
        assert!(!is_broad_query(&narrow));
    }

    #[test]
    fn fair_share_divides_budget() {
        assert_eq!(fair_share(Duration::from_secs(4), 2), Duration::from_secs(2));
        assert_eq!(fair_share(Duration::from_secs(4), 0), Duration::from_secs(4));
    }
}
