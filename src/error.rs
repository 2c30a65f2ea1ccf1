//! Engine-wide error taxonomy.
//!
//! Named variants, no silent `anyhow::Error` escaping across the
//! executor/orchestrator boundary — grounded on the teacher's
//! `crawl_events::errors::EventBusError` pattern.

use thiserror::Error;

/// Errors a FastPath run can terminate with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FastPathError {
    #[error("no matching product found")]
    ProductNotFound,
    #[error("blocked by aggregator: {0}")]
    Blocked(String),
    #[error("deadline exceeded before completion")]
    Timeout,
    #[error("failed to parse aggregator response: {0}")]
    Parse(String),
    #[error("network failure: {0}")]
    Network(String),
}

/// Errors a SlowPath run can terminate with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlowPathError {
    #[error("no matching product found")]
    ProductNotFound,
    #[error("blocked by aggregator: {0}")]
    Blocked(String),
    #[error("deadline exceeded before completion")]
    Timeout,
    #[error("browser crashed: {0}")]
    BrowserCrash(String),
    #[error("failed to parse aggregator response: {0}")]
    Parse(String),
}

/// Engine-wide error taxonomy, matching the HTTP-mapping table in section 7
/// of the specification. The HTTP adapter is the only place that maps these
/// onto status codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("product not found")]
    NotFound,
    #[error("request timed out")]
    Timeout,
    #[error("blocked by aggregator")]
    Blocked,
    #[error("request budget exhausted")]
    BudgetExhausted,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<FastPathError> for EngineError {
    fn from(e: FastPathError) -> Self {
        match e {
            FastPathError::ProductNotFound => EngineError::NotFound,
            FastPathError::Blocked(_) => EngineError::Blocked,
            FastPathError::Timeout => EngineError::Timeout,
            FastPathError::Parse(msg) => EngineError::Internal(msg),
            FastPathError::Network(msg) => EngineError::Internal(msg),
        }
    }
}

impl From<SlowPathError> for EngineError {
    fn from(e: SlowPathError) -> Self {
        match e {
            SlowPathError::ProductNotFound => EngineError::NotFound,
            SlowPathError::Blocked(_) => EngineError::Blocked,
            SlowPathError::Timeout => EngineError::Timeout,
            SlowPathError::BrowserCrash(msg) => EngineError::Internal(msg),
            SlowPathError::Parse(msg) => EngineError::Internal(msg),
        }
    }
}
