//! # Prometheus Metrics
//!
//! HTTP metrics (request counts, latency, errors) are recorded in
//! [`metrics_middleware`]. Domain counters (credentials signed and verified,
//! status changes, keys generated) are incremented by the route handlers.
//! Everything is exported in text format on `/metrics`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Domain counters --
    credentials_signed_total: IntCounterVec,
    credentials_verified_total: IntCounterVec,
    status_changes_total: IntCounterVec,
    signing_keys_generated_total: IntCounterVec,
    key_encryption_ephemeral: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a metrics instance with a fresh Prometheus registry.
    pub fn try_new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("bdg_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "bdg_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new("bdg_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )?;
        let credentials_signed_total = IntCounterVec::new(
            Opts::new("bdg_credentials_signed_total", "Credentials signed by proof format"),
            &["format"],
        )?;
        let credentials_verified_total = IntCounterVec::new(
            Opts::new(
                "bdg_credentials_verified_total",
                "Credential verifications by proof format and outcome",
            ),
            &["format", "result"],
        )?;
        let status_changes_total = IntCounterVec::new(
            Opts::new(
                "bdg_status_changes_total",
                "Status bits written, by purpose and new value",
            ),
            &["purpose", "value"],
        )?;
        let signing_keys_generated_total = IntCounterVec::new(
            Opts::new("bdg_signing_keys_generated_total", "Signing keys generated by algorithm"),
            &["algorithm"],
        )?;
        let key_encryption_ephemeral = Gauge::new(
            "bdg_key_encryption_ephemeral",
            "Whether the key-encryption key is ephemeral (1=ephemeral, 0=configured)",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(credentials_signed_total.clone()))?;
        registry.register(Box::new(credentials_verified_total.clone()))?;
        registry.register(Box::new(status_changes_total.clone()))?;
        registry.register(Box::new(signing_keys_generated_total.clone()))?;
        registry.register(Box::new(key_encryption_ephemeral.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                credentials_signed_total,
                credentials_verified_total,
                status_changes_total,
                signing_keys_generated_total,
                key_encryption_ephemeral,
            }),
        })
    }

    /// Total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        sum_counter(&self.inner.http_requests_total)
    }

    /// Total error count (sum across all labels).
    pub fn errors(&self) -> u64 {
        sum_counter(&self.inner.http_errors_total)
    }

    /// Total credentials signed.
    pub fn credentials_signed(&self) -> u64 {
        sum_counter(&self.inner.credentials_signed_total)
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    pub fn record_signed(&self, format: &str) {
        self.inner
            .credentials_signed_total
            .with_label_values(&[format])
            .inc();
    }

    pub fn record_verified(&self, format: &str, verified: bool) {
        let result = if verified { "verified" } else { "rejected" };
        self.inner
            .credentials_verified_total
            .with_label_values(&[format, result])
            .inc();
    }

    pub fn record_status_change(&self, purpose: &str, value: bool) {
        let value = if value { "set" } else { "cleared" };
        self.inner
            .status_changes_total
            .with_label_values(&[purpose, value])
            .inc();
    }

    pub fn record_key_generated(&self, algorithm: &str) {
        self.inner
            .signing_keys_generated_total
            .with_label_values(&[algorithm])
            .inc();
    }

    pub fn key_encryption_ephemeral(&self) -> &Gauge {
        &self.inner.key_encryption_ephemeral
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

fn sum_counter(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Replace UUID segments with `{id}` to bound label cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let hyphenated = segment.len() == 36
                && segment.chars().enumerate().all(|(i, c)| {
                    if i == 8 || i == 13 || i == 18 || i == 23 {
                        c == '-'
                    } else {
                        c.is_ascii_hexdigit()
                    }
                });
            let bare = segment.len() == 32 && segment.chars().all(|c| c.is_ascii_hexdigit());
            if hyphenated || bare {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Records HTTP request metrics. The path label is the matched route
/// template when routing succeeded.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| normalize_path(request.uri().path()));
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        m.record_request(&method, &path, response.status().as_u16(), duration);
    }

    response
}
