//! Observability for the Alfred mock server: structured JSON logging with
//! a runtime-reloadable level, OpenTelemetry OTLP tracing, and Prometheus
//! metrics.

pub mod logging;
pub mod metrics;
pub mod tracing_init;

pub use logging::{current_level, init_logging, set_level, LoggingConfig};
pub use metrics::{metrics_router, MetricsRegistry};
pub use tracing_init::{init_tracer, shutdown_tracer, OtelConfig};

/// Observability setup errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("log level '{0}' is not allowed, use one of: debug, info, error")]
    InvalidLevel(String),

    #[error("unknown trace sampler '{0}'")]
    InvalidSampler(String),

    #[error("bad sampler argument '{arg}' for '{sampler}'")]
    InvalidSamplerArg { sampler: String, arg: String },

    #[error("trace exporter error: {0}")]
    Trace(#[from] opentelemetry::trace::TraceError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("{0}")]
    Init(String),
}
