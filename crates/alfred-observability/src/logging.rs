//! Structured JSON logging with a runtime-reloadable level.
//!
//! The `/logger` control endpoint mutates the level through the reload
//! handle kept here; only `debug`, `info` and `error` are accepted.

use once_cell::sync::OnceCell;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, Layer, Registry};

use crate::Error;

pub const LOG_LEVEL_DEBUG: &str = "debug";
pub const LOG_LEVEL_INFO: &str = "info";
pub const LOG_LEVEL_ERROR: &str = "error";

type ReloadHandle = reload::Handle<LevelFilter, Registry>;

static LEVEL_HANDLE: OnceCell<ReloadHandle> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Initial level: `debug`, `info` or `error`.
    pub level: String,
    /// Service identity, logged at startup.
    pub component: String,
    pub version: String,
    /// Plain text output instead of JSON (used by tests and local runs).
    pub plain: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LOG_LEVEL_INFO.to_string(),
            component: "alfred".to_string(),
            version: String::new(),
            plain: false,
        }
    }
}

/// Initialize the global subscriber: a reloadable level filter, a JSON
/// fmt layer, and optionally an OpenTelemetry layer exporting spans
/// through the given tracer.
pub fn init_logging(
    config: &LoggingConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), Error> {
    let (filter, handle) = reload::Layer::new(parse_level(&config.level)?);

    let registry = tracing_subscriber::registry().with(filter);

    type Stack = tracing_subscriber::layer::Layered<
        reload::Layer<LevelFilter, Registry>,
        Registry,
    >;

    let fmt_layer: Box<dyn Layer<Stack> + Send + Sync> = if config.plain {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed()
    };

    type StackWithFmt =
        tracing_subscriber::layer::Layered<Box<dyn Layer<Stack> + Send + Sync>, Stack>;

    let otel_layer: Option<Box<dyn Layer<StackWithFmt> + Send + Sync>> = tracer
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer).boxed());

    registry
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| Error::Init(format!("failed to install the subscriber: {e}")))?;

    LEVEL_HANDLE
        .set(handle)
        .map_err(|_| Error::Init("logging initialized twice".to_string()))?;

    tracing::info!(
        component = %config.component,
        app_version = %config.version,
        level = %config.level,
        "logging initialized"
    );
    Ok(())
}

/// Change the effective level at runtime.
pub fn set_level(level: &str) -> Result<(), Error> {
    let filter = parse_level(level)?;
    let handle = LEVEL_HANDLE
        .get()
        .ok_or_else(|| Error::Init("logging is not initialized".to_string()))?;
    handle
        .modify(|current| *current = filter)
        .map_err(|e| Error::Init(format!("failed to reload the level: {e}")))?;
    Ok(())
}

/// The effective level, as a lowercase name.
pub fn current_level() -> String {
    LEVEL_HANDLE
        .get()
        .and_then(|handle| handle.clone_current())
        .map(|filter| filter.to_string().to_lowercase())
        .unwrap_or_default()
}

fn parse_level(level: &str) -> Result<LevelFilter, Error> {
    match level {
        LOG_LEVEL_DEBUG => Ok(LevelFilter::DEBUG),
        LOG_LEVEL_INFO => Ok(LevelFilter::INFO),
        LOG_LEVEL_ERROR => Ok(LevelFilter::ERROR),
        other => Err(Error::InvalidLevel(other.to_string())),
    }
}
