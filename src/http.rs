//! Inbound HTTP adapter: request validation/routing and the
//! engine-taxonomy-to-status-code mapping. Everything the orchestrator
//! produces is domain data; this module is the only place that knows about
//! JSON wire shapes or HTTP status codes.

use std::sync::Arc;

use axum::extract::{Path, Query as AxumQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cache::CacheAdapter;
use crate::failure_recorder::FailureRecorder;
use crate::model::{FailureStatus, Query, SearchResult};
use crate::orchestrator::Orchestrator;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub cache: Arc<dyn CacheAdapter>,
    pub failure_recorder: Arc<FailureRecorder>,
    pub slowpath_enabled: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/price/search", post(search))
        .route("/api/v1/health", get(health))
        .route("/api/v1/analytics/dashboard", get(analytics_dashboard))
        .route("/api/v1/analytics/common-failures", get(analytics_common_failures))
        .route("/api/v1/analytics/improvements", get(analytics_improvements))
        .route("/api/v1/analytics/export", get(analytics_export))
        .route("/api/v1/analytics/resolve/{id}", post(analytics_resolve))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    product_name: String,
    current_price: Option<i64>,
    current_url: Option<String>,
    product_code: Option<String>,
}

async fn search(State(state): State<Arc<AppState>>, Json(body): Json<SearchRequest>) -> Response {
    let query = Query {
        product_name: body.product_name,
        current_price: body.current_price,
        current_url: body.current_url,
        product_code: body.product_code,
    };

    match state.orchestrator.handle(query.clone()).await {
        Ok(result) => render_result(result, query.current_price),
        Err(e) => error_response(e),
    }
}

fn render_result(result: SearchResult, current_price: Option<i64>) -> Response {
    let elapsed_ms = result.elapsed_ms();
    match result {
        SearchResult::Success { payload, .. } => {
            let is_cheaper = current_price.map(|p| payload.lowest_price < p).unwrap_or(false);
            let price_diff = current_price.map(|p| p - payload.lowest_price).unwrap_or(0);
            let top_prices: Vec<_> = payload
                .top_offers
                .iter()
                .map(|o| {
                    json!({
                        "rank": o.rank,
                        "mall": o.mall,
                        "price": o.price,
                        "free_shipping": o.free_shipping,
                        "delivery": o.delivery,
                        "link": o.link,
                    })
                })
                .collect();
            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "data": {
                        "product_name": payload.product_name,
                        "product_id": payload.product_id,
                        "is_cheaper": is_cheaper,
                        "price_diff": price_diff,
                        "lowest_price": payload.lowest_price,
                        "link": payload.link,
                        "mall": payload.mall,
                        "free_shipping": payload.free_shipping,
                        "top_prices": top_prices,
                        "price_trend": [],
                        "source": payload.source,
                        "elapsed_ms": elapsed_ms,
                    },
                    "message": "ok",
                })),
            )
                .into_response()
        }
        SearchResult::NotFound { .. } => error_body(StatusCode::SERVICE_UNAVAILABLE, "PRODUCT_NOT_FOUND", "no matching product was found"),
        SearchResult::Timeout { .. } => error_body(StatusCode::SERVICE_UNAVAILABLE, "TIMEOUT", "the search did not complete in time"),
        SearchResult::Blocked { .. } => error_body(StatusCode::SERVICE_UNAVAILABLE, "BLOCKED", "the aggregator blocked this request"),
        SearchResult::BudgetExhausted { .. } => error_body(StatusCode::SERVICE_UNAVAILABLE, "TIMEOUT", "the request budget was exhausted"),
        SearchResult::NoResults { .. } | SearchResult::ParseError { .. } => {
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "the search could not be completed")
        }
    }
}

fn error_response(e: crate::error::EngineError) -> Response {
    use crate::error::EngineError::*;
    match e {
        InvalidInput(msg) => error_body(StatusCode::BAD_REQUEST, "INVALID_INPUT", &msg),
        NotFound => error_body(StatusCode::SERVICE_UNAVAILABLE, "PRODUCT_NOT_FOUND", "no matching product was found"),
        Timeout => error_body(StatusCode::SERVICE_UNAVAILABLE, "TIMEOUT", "the search did not complete in time"),
        Blocked => error_body(StatusCode::SERVICE_UNAVAILABLE, "BLOCKED", "the aggregator blocked this request"),
        BudgetExhausted => error_body(StatusCode::SERVICE_UNAVAILABLE, "TIMEOUT", "the request budget was exhausted"),
        Internal(_) => error_body(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "an internal error occurred"),
    }
}

fn error_body(status: StatusCode, error_code: &str, message: &str) -> Response {
    (status, Json(json!({ "status": "error", "error_code": error_code, "message": message }))).into_response()
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    redis: &'static str,
    database: &'static str,
    browser: &'static str,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state.failure_recorder.stats(1).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };
    let browser = if state.slowpath_enabled { "ready" } else { "disabled" };
    let redis = "connected"; // in-process cache adapter is always reachable
    let overall = if database == "connected" { "healthy" } else { "degraded" };
    Json(HealthResponse { status: overall, redis, database, browser })
}

async fn analytics_dashboard(State(state): State<Arc<AppState>>) -> Response {
    match state.failure_recorder.stats(30).await {
        Ok(stats) => Json(json!({ "status": "success", "data": stats })).into_response(),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", &e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

async fn analytics_common_failures(State(state): State<Arc<AppState>>, AxumQuery(params): AxumQuery<LimitParams>) -> Response {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    match state.failure_recorder.common(limit).await {
        Ok(rows) => Json(json!({ "status": "success", "data": rows })).into_response(),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", &e.to_string()),
    }
}

async fn analytics_improvements(State(state): State<Arc<AppState>>) -> Response {
    match state.failure_recorder.suggestions().await {
        Ok(rows) => Json(json!({ "status": "success", "data": rows })).into_response(),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", &e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    format: Option<String>,
}

async fn analytics_export(State(state): State<Arc<AppState>>, AxumQuery(params): AxumQuery<ExportParams>) -> Response {
    let rows = match state.failure_recorder.common(500).await {
        Ok(rows) => rows,
        Err(e) => return error_body(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", &e.to_string()),
    };
    match params.format.as_deref() {
        Some("csv") => {
            let mut csv = String::from("original_query,normalized_query,count\n");
            for row in rows {
                csv.push_str(&format!("{},{},{}\n", row.original_query, row.normalized_query, row.count));
            }
            ([("content-type", "text/csv")], csv).into_response()
        }
        _ => Json(json!({ "status": "success", "data": rows })).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    status: String,
    correct_name: Option<String>,
    correct_product_id: Option<String>,
}

async fn analytics_resolve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<ResolveRequest>,
) -> Response {
    let status = match body.status.as_str() {
        "manual_fixed" => FailureStatus::ManualFixed,
        "auto_learned" => FailureStatus::AutoLearned,
        "not_product" => FailureStatus::NotProduct,
        _ => FailureStatus::Pending,
    };
    match state.failure_recorder.resolve(id, status, body.correct_name, body.correct_product_id).await {
        Ok(()) => Json(json!({ "status": "success" })).into_response(),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", &e.to_string()),
    }
}
