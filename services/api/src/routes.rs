use crate::infra::{AppState, Configurator};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use configurator::engine::{RuleCatalog, RuleSnapshot};
use configurator::router::configurator_router;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct CatalogValidationResponse {
    pub(crate) valid: bool,
    pub(crate) product_types: usize,
    pub(crate) eligibility_rules: usize,
    pub(crate) labor_rules: usize,
    pub(crate) issues: Vec<String>,
}

pub(crate) fn with_service_routes(state: Arc<Configurator>) -> axum::Router {
    configurator_router(state)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/catalog/validate",
            axum::routing::post(validate_catalog_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Dry-runs a rule catalog without touching the served snapshot.
pub(crate) async fn validate_catalog_endpoint(
    Json(catalog): Json<RuleCatalog>,
) -> Json<CatalogValidationResponse> {
    let snapshot = RuleSnapshot::compile(&catalog);
    let issues: Vec<String> = snapshot.issues().iter().map(ToString::to_string).collect();

    Json(CatalogValidationResponse {
        valid: issues.is_empty(),
        product_types: catalog.product_types.len(),
        eligibility_rules: catalog.eligibility_rules.len(),
        labor_rules: catalog.labor_rules.len(),
        issues,
    })
}
