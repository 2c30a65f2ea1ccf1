pub mod browser_pool;
pub mod browser_profile;
pub mod browser_setup;
pub mod budget;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod failure_recorder;
pub mod fastpath;
pub mod http;
pub mod model;
pub mod normalizer;
pub mod orchestrator;
pub mod site_adapter;
pub mod slowpath;
pub mod validation_gate;

pub use config::EngineConfig;
pub use error::EngineError;
pub use model::{Query, SearchResult};
pub use orchestrator::Orchestrator;
