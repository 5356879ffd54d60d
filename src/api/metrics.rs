//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations
//! - Counters for sign-ups, sign-ins, token refreshes and cart mutations

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

// Metric names as constants for consistency
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const SIGN_UPS_TOTAL: &str = "auth_sign_ups_total";
pub const SIGN_INS_TOTAL: &str = "auth_sign_ins_total";
pub const TOKEN_REFRESHES_TOTAL: &str = "auth_token_refreshes_total";
pub const CART_MUTATIONS_TOTAL: &str = "cart_mutations_total";
pub const CATALOG_PRODUCTS: &str = "catalog_products";

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Call once during startup; a second install fails.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
    describe_counter!(SIGN_UPS_TOTAL, "Sign-up attempts by outcome (success/failed)");
    describe_counter!(SIGN_INS_TOTAL, "Sign-in attempts by outcome (success/failed)");
    describe_counter!(TOKEN_REFRESHES_TOTAL, "Token refresh attempts by outcome (success/failed)");
    describe_counter!(CART_MUTATIONS_TOTAL, "Successful cart mutations by kind");
    describe_gauge!(CATALOG_PRODUCTS, "Number of products in the catalog");

    Ok(handle)
}

/// GET /metrics - Returns Prometheus-formatted metrics.
///
/// This endpoint is accessible without authentication.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    update_gauge_metrics(&state).await;

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Metrics not initialized".to_string(),
        ),
    }
}

async fn update_gauge_metrics(state: &AppState) {
    if let Ok(count) = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
        .fetch_one(&state.db)
        .await
    {
        gauge!(CATALOG_PRODUCTS).set(count as f64);
    }
}

/// Middleware to track HTTP request metrics.
///
/// Records:
/// - `http_requests_total` counter with method, path, and status labels
/// - `http_request_duration_seconds` histogram with method and path labels
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    // Use the route template (/product/:id) so ids don't explode label cardinality
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failed"
    }
}

pub fn record_sign_up(success: bool) {
    counter!(SIGN_UPS_TOTAL, "outcome" => outcome(success)).increment(1);
}

pub fn record_sign_in(success: bool) {
    counter!(SIGN_INS_TOTAL, "outcome" => outcome(success)).increment(1);
}

pub fn record_token_refresh(success: bool) {
    counter!(TOKEN_REFRESHES_TOTAL, "outcome" => outcome(success)).increment(1);
}

/// `kind` is one of create, merge, update, remove, clear
pub fn record_cart_mutation(kind: &'static str) {
    counter!(CART_MUTATIONS_TOTAL, "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        // Prometheus naming conventions
        for name in [
            HTTP_REQUESTS_TOTAL,
            SIGN_UPS_TOTAL,
            SIGN_INS_TOTAL,
            TOKEN_REFRESHES_TOTAL,
            CART_MUTATIONS_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "{} should end with _total", name);
        }
        assert!(HTTP_REQUEST_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_sign_up(true);
        record_sign_in(false);
        record_token_refresh(true);
        record_cart_mutation("merge");
    }
}
