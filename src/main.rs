//! Search execution engine HTTP server: cache-first / FastPath / SlowPath
//! pipeline against a price-comparison aggregator, under a strict per-request
//! wall-clock budget.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use price_engine::browser_pool::{BrowserPool, BrowserPoolConfig};
use price_engine::cache::{CacheAdapter, InMemoryCache};
use price_engine::circuit_breaker::CircuitBreaker;
use price_engine::config::EngineConfig;
use price_engine::failure_recorder::FailureRecorder;
use price_engine::fastpath::FastPathExecutor;
use price_engine::http::{router, AppState};
use price_engine::orchestrator::Orchestrator;
use price_engine::site_adapter::{ReferenceAdapter, SiteAdapter};
use price_engine::slowpath::SlowPathExecutor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let resource_dir = std::env::var("PRICE_ENGINE_RESOURCE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("resources"));
    let config = Arc::new(EngineConfig::from_env(&resource_dir)?);
    info!(environment = %config.environment, "starting price engine");

    let breaker = Arc::new(CircuitBreaker::new(3, 1, std::time::Duration::from_secs(60)));
    let cache: Arc<dyn CacheAdapter> = Arc::new(InMemoryCache::new(breaker));

    let origin = url::Url::parse(&config.aggregator_base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| config.aggregator_base_url.clone());

    let adapter: Arc<dyn SiteAdapter> = Arc::new(ReferenceAdapter::new(config.aggregator_base_url.clone()));

    let fastpath = Arc::new(FastPathExecutor::new(
        &config.user_agent,
        adapter.clone(),
        cache.clone(),
        origin.clone(),
    ));

    let browser_pool = BrowserPool::new(BrowserPoolConfig::default());
    if config.slowpath_enabled {
        browser_pool.start().await?;
    }
    let slowpath = Arc::new(SlowPathExecutor::new(browser_pool.clone(), adapter, cache.clone(), origin));

    let failure_recorder = Arc::new(FailureRecorder::connect(&config.database_url).await?);

    let orchestrator = Orchestrator::new(config.clone(), cache.clone(), fastpath, slowpath, failure_recorder.clone());

    let state = Arc::new(AppState {
        orchestrator,
        cache,
        failure_recorder,
        slowpath_enabled: config.slowpath_enabled,
    });

    let app = router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = std::env::var("PRICE_ENGINE_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;

    browser_pool.shutdown().await?;
    Ok(())
}
