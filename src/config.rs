//! Environment-driven engine configuration and static resource loading.
//!
//! Mirrors the teacher's `CrawlConfig` role (a single config value threaded
//! through the pipeline) but loaded from environment variables and JSON
//! resource files rather than a builder API, per the external-interfaces
//! contract in section 6 of the specification.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::normalizer::{AccessoryTokens, BrandLexicon, CategoryKeywords, HardMapping, SynonymRules};

/// User agent used for both FastPath HTTP requests and the SlowPath browser,
/// so the aggregator sees a consistent client across both paths.
pub const CHROME_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

/// Top-level engine configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub environment: String,
    pub log_level: String,
    pub cache_url: Option<String>,
    pub database_url: String,
    pub user_agent: String,
    pub aggregator_base_url: String,
    pub slowpath_enabled: bool,
    pub budget: BudgetConfig,
    pub resources: Arc<ResourceTables>,
}

/// Per-stage timeout overrides (milliseconds in the environment, seconds here).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub total: Duration,
    pub cache: Duration,
    pub fastpath: Duration,
    pub slowpath: Duration,
    pub min_remaining: Duration,
    pub broad_query_fastpath: Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total: Duration::from_secs_f64(12.0),
            cache: Duration::from_secs_f64(0.5),
            fastpath: Duration::from_secs_f64(4.0),
            slowpath: Duration::from_secs_f64(6.5),
            min_remaining: Duration::from_secs_f64(1.0),
            broad_query_fastpath: Duration::from_secs_f64(10.0),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults. Fails fast if the derived budget is internally inconsistent
    /// (mirrors `CrawlConfig`'s builder validation).
    pub fn from_env(resource_dir: &Path) -> Result<Self> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
        let cache_url = std::env::var("CACHE_URL").ok();
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://price_engine.sqlite".into());
        let user_agent = std::env::var("PRICE_ENGINE_USER_AGENT")
            .unwrap_or_else(|_| CHROME_USER_AGENT.to_string());
        let aggregator_base_url = std::env::var("AGGREGATOR_BASE_URL")
            .unwrap_or_else(|_| "https://aggregator.example.com".into());
        let slowpath_enabled = std::env::var("FEATURES_SLOWPATH_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let mut budget = BudgetConfig::default();
        if let Ok(ms) = std::env::var("BUDGET_TOTAL_MS") {
            budget.total = parse_ms(&ms)?;
        }
        if let Ok(ms) = std::env::var("BUDGET_CACHE_MS") {
            budget.cache = parse_ms(&ms)?;
        }
        if let Ok(ms) = std::env::var("BUDGET_FASTPATH_MS") {
            budget.fastpath = parse_ms(&ms)?;
        }
        if let Ok(ms) = std::env::var("BUDGET_SLOWPATH_MS") {
            budget.slowpath = parse_ms(&ms)?;
        }

        let stage_sum = budget.cache + budget.fastpath + budget.slowpath;
        if stage_sum > budget.total {
            anyhow::bail!(
                "invalid budget configuration: cache+fastpath+slowpath ({:?}) exceeds total ({:?})",
                stage_sum,
                budget.total
            );
        }

        let resources = Arc::new(ResourceTables::load(resource_dir)?);

        Ok(Self {
            environment,
            log_level,
            cache_url,
            database_url,
            user_agent,
            aggregator_base_url,
            slowpath_enabled,
            budget,
            resources,
        })
    }
}

fn parse_ms(s: &str) -> Result<Duration> {
    let ms: u64 = s
        .parse()
        .with_context(|| format!("invalid duration override: {s}"))?;
    Ok(Duration::from_millis(ms))
}

/// Static resource tables loaded once at startup and held immutable for the
/// lifetime of the process (hot reload is not required).
#[derive(Debug)]
pub struct ResourceTables {
    pub hard_mapping: HardMapping,
    pub synonyms: SynonymRules,
    pub accessory_tokens: AccessoryTokens,
    pub category_keywords: CategoryKeywords,
    pub brand_lexicon: BrandLexicon,
}

impl ResourceTables {
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            hard_mapping: load_json_or_default(&dir.join("hard_map.json"))?,
            synonyms: load_json_or_default(&dir.join("synonyms.json"))?,
            accessory_tokens: load_json_or_default(&dir.join("accessory_tokens.json"))?,
            category_keywords: load_json_or_default(&dir.join("category_keywords.json"))?,
            brand_lexicon: load_json_or_default(&dir.join("brand_lexicon.json"))?,
        })
    }

    /// Built-in defaults, used by tests and as a safety net when no resource
    /// directory is configured.
    pub fn defaults() -> Self {
        Self {
            hard_mapping: HardMapping::default(),
            synonyms: SynonymRules::default(),
            accessory_tokens: AccessoryTokens::default(),
            category_keywords: CategoryKeywords::default(),
            brand_lexicon: BrandLexicon::default(),
        }
    }
}

fn load_json_or_default<T: for<'de> Deserialize<'de> + Default>(path: &PathBuf) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read resource file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse resource file {}", path.display()))
}
