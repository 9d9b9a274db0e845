//! Prometheus metric surface: request counts, durations, slow requests.

use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

use crate::Error;

pub struct MetricsRegistry {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_slow_requests_total: IntCounterVec,
    slow_time: Duration,
}

impl MetricsRegistry {
    pub fn new(slow_time_seconds: u64) -> Result<Arc<Self>, Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("alfred_http_requests_total", "Served requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "alfred_http_request_duration_seconds",
                "Request duration, response delay included",
            ),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        let http_slow_requests_total = IntCounterVec::new(
            Opts::new(
                "alfred_http_slow_requests_total",
                "Requests slower than the configured slow-time",
            ),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_slow_requests_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_slow_requests_total,
            slow_time: Duration::from_secs(slow_time_seconds),
        }))
    }

    pub fn observe(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        self.http_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(elapsed.as_secs_f64());
        if elapsed > self.slow_time {
            self.http_slow_requests_total
                .with_label_values(&[method, path])
                .inc();
        }
    }

    /// Text exposition of every registered metric.
    pub fn gather(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("failed to encode metrics: {e}");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Router exposing the metrics at the configured path.
pub fn metrics_router(registry: Arc<MetricsRegistry>, path: &str) -> Router {
    Router::new().route(path, get(move || async move { registry.gather() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_and_gather() {
        let metrics = MetricsRegistry::new(1).unwrap();
        metrics.observe("GET", "/echo", 200, Duration::from_millis(12));
        metrics.observe("GET", "/echo", 200, Duration::from_secs(2));

        let text = metrics.gather();
        assert!(text.contains("alfred_http_requests_total"));
        assert!(text.contains("alfred_http_slow_requests_total"));
        assert!(text.contains(r#"method="GET""#));
    }
}
