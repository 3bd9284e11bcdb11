//! Prometheus metrics for the file portal.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides an axum middleware for HTTP RED
//! metrics, and exposes the `/metrics` endpoint handler.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "fileportal_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "fileportal_http_request_duration_seconds";

/// Origin-request routing decisions (counter). Labels: outcome.
pub const ROUTE_DECISIONS_TOTAL: &str = "fileportal_route_decisions_total";

/// Upload URL requests (counter). Labels: status.
pub const UPLOAD_GRANTS_TOTAL: &str = "fileportal_upload_grants_total";

/// Responses that received `content-disposition: attachment` (counter).
pub const DISPOSITIONS_TOTAL: &str = "fileportal_dispositions_total";

/// Errors answered by the emulator (counter). Labels: code.
pub const ERRORS_TOTAL: &str = "fileportal_errors_total";

// -- Global recorder installation ---------------------------------------------

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent.
pub fn init_metrics() -> anyhow::Result<&'static PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// Register metric descriptions with the global recorder.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(ROUTE_DECISIONS_TOTAL, "Origin-request routing decisions");
    describe_counter!(UPLOAD_GRANTS_TOTAL, "Upload URL requests by status");
    describe_counter!(ERRORS_TOTAL, "Error responses by error code");
    describe_counter!(
        DISPOSITIONS_TOTAL,
        "Responses forced to download via Content-Disposition"
    );
}

// -- Metrics middleware -------------------------------------------------------

/// Records HTTP RED metrics for every request except `/metrics` itself.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path, "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

/// Map a request path to a route template for metric labels, so object
/// keys never become label values.
fn normalize_path(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/download" => "/download",
        "/upload-url" => "/upload-url",
        "/health" => "/health",
        _ => "/{key}",
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> Response {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_routes() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/download"), "/download");
        assert_eq!(normalize_path("/upload-url"), "/upload-url");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_normalize_object_keys() {
        assert_eq!(normalize_path("/report.pdf"), "/{key}");
        assert_eq!(normalize_path("/dir/sub/file.txt"), "/{key}");
        assert_eq!(normalize_path("/download/extra"), "/{key}");
    }
}
