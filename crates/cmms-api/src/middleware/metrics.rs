//! # Request Metrics
//!
//! Lightweight request metrics using atomic counters, reported as JSON
//! by the `/metrics` endpoint. The same events are emitted through the
//! `metrics` facade, which the binary can export to Prometheus with
//! [`install_prometheus`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shared metrics state.
#[derive(Debug, Clone)]
pub struct ApiMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub server_error_count: Arc<AtomicU64>,
}

impl ApiMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            server_error_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return current request count.
    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Return current error count (4xx and 5xx).
    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Return current 5xx count.
    pub fn server_errors(&self) -> u64 {
        self.server_error_count.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests(),
            errors: self.errors(),
            server_errors: self.server_errors(),
        }
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values reported by `GET /metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub server_errors: u64,
}

/// Middleware that increments request and error counters.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    let status = response.status();
    metrics::counter!("cmms_http_requests_total", "status" => status.as_u16().to_string())
        .increment(1);

    if let Some(m) = metrics {
        m.request_count.fetch_add(1, Ordering::Relaxed);
        if status.is_server_error() || status.is_client_error() {
            m.error_count.fetch_add(1, Ordering::Relaxed);
        }
        if status.is_server_error() {
            m.server_error_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    response
}

/// Install the Prometheus recorder with a scrape listener on `0.0.0.0:port`.
///
/// Must be called from inside a Tokio runtime.
pub fn install_prometheus(
    port: u16,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    tracing::info!(port, "Prometheus exporter listening");
    Ok(())
}

/// GET /metrics — Request counters.
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Current counters", body = MetricsSnapshot),
    ),
    tag = "operations"
)]
pub(crate) async fn metrics_report(Extension(metrics): Extension<ApiMetrics>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(
            m.snapshot(),
            MetricsSnapshot {
                requests: 0,
                errors: 0,
                server_errors: 0
            }
        );
    }

    #[test]
    fn clones_share_counters() {
        let m = ApiMetrics::new();
        let other = m.clone();
        m.request_count.fetch_add(3, Ordering::Relaxed);
        assert_eq!(other.requests(), 3);
    }
}
