//! Wall-clock budget tracking for a single search request.
//!
//! One `Budget` is created per request and threaded through every stage; it
//! answers "how long do I have left" and "is it even worth starting this
//! stage" rather than each stage picking its own timeout. Grounded on the
//! teacher's `crawl_engine::page_timeout` deadline-propagation shape.

use std::time::{Duration, Instant};

use crate::config::BudgetConfig;

/// A stage identifier used to look up the configured sub-budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cache,
    FastPath,
    SlowPath,
}

/// Tracks elapsed wall-clock time against the configured total and per-stage
/// budgets for one request.
#[derive(Debug, Clone)]
pub struct Budget {
    start: Instant,
    config: BudgetConfig,
    /// Set when a broad (low-specificity) query widens the FastPath
    /// sub-budget at the expense of SlowPath, per the broad-query policy.
    broad_query: bool,
}

impl Budget {
    pub fn start(config: BudgetConfig) -> Self {
        Self {
            start: Instant::now(),
            config,
            broad_query: false,
        }
    }

    /// Mark this request as a broad query: FastPath gets the wider
    /// `broad_query_fastpath` allowance and SlowPath is skipped, since a
    /// broad query is expected to return many plausible matches that a
    /// full-page render would not meaningfully improve.
    pub fn mark_broad_query(&mut self) {
        self.broad_query = true;
    }

    pub fn is_broad_query(&self) -> bool {
        self.broad_query
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.config.total.saturating_sub(self.elapsed())
    }

    /// Exhausted once less than `min_remaining` is left, not just at exactly
    /// zero: there's no point starting anything with a few stray
    /// milliseconds left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() < self.config.min_remaining
    }

    /// The timeout to use for a given stage: the smaller of that stage's
    /// configured allowance and whatever is actually left in the total
    /// budget.
    pub fn timeout_for(&self, stage: Stage) -> Duration {
        let allowance = match stage {
            Stage::Cache => self.config.cache,
            Stage::FastPath if self.broad_query => self.config.broad_query_fastpath,
            Stage::FastPath => self.config.fastpath,
            Stage::SlowPath => self.config.slowpath,
        };
        allowance.min(self.remaining())
    }

    /// Whether there is enough time left to be worth starting `stage` at
    /// all: strictly the full stage default, so a partially-consumed stage
    /// is never started (the caller still wraps the call in `timeout_for`
    /// as a hard cap).
    pub fn can_run(&self, stage: Stage) -> bool {
        if self.broad_query && stage == Stage::SlowPath {
            return false;
        }
        let stage_default = match stage {
            Stage::Cache => self.config.cache,
            Stage::FastPath if self.broad_query => self.config.broad_query_fastpath,
            Stage::FastPath => self.config.fastpath,
            Stage::SlowPath => self.config.slowpath,
        };
        self.remaining() >= stage_default && self.remaining() >= self.config.min_remaining
    }

    /// Log-friendly checkpoint string: `"<stage> started at 820ms, 4180ms remaining"`.
    pub fn checkpoint(&self, label: &str) -> String {
        format!(
            "{label} at {}ms, {}ms remaining",
            self.elapsed().as_millis(),
            self.remaining().as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_for_respects_remaining_budget() {
        let budget = Budget::start(BudgetConfig {
            total: Duration::from_millis(100),
            cache: Duration::from_millis(50),
            fastpath: Duration::from_millis(50),
            slowpath: Duration::from_millis(50),
            min_remaining: Duration::from_millis(10),
            broad_query_fastpath: Duration::from_millis(90),
        });
        assert!(budget.timeout_for(Stage::Cache) <= Duration::from_millis(50));
    }

    #[test]
    fn broad_query_skips_slowpath() {
        let mut budget = Budget::start(BudgetConfig::default());
        budget.mark_broad_query();
        assert!(!budget.can_run(Stage::SlowPath));
        assert_eq!(budget.timeout_for(Stage::FastPath), budget.remaining().min(Duration::from_secs_f64(10.0)));
    }

    #[test]
    fn exhausted_budget_cannot_run_any_stage() {
        let budget = Budget::start(BudgetConfig {
            total: Duration::from_millis(0),
            ..BudgetConfig::default()
        });
        assert!(budget.is_exhausted());
        assert!(!budget.can_run(Stage::FastPath));
    }

    #[test]
    fn exhausted_below_min_remaining_not_just_zero() {
        let budget = Budget::start(BudgetConfig {
            total: Duration::from_millis(500),
            min_remaining: Duration::from_secs(1),
            ..BudgetConfig::default()
        });
        assert!(budget.is_exhausted());
    }
}
