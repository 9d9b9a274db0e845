//! OpenTelemetry OTLP tracing setup.

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace as sdktrace;
use opentelemetry_sdk::Resource;

use crate::Error;

pub const SAMPLER_ALWAYS_ON: &str = "always_on";
pub const SAMPLER_ALWAYS_OFF: &str = "always_off";
pub const SAMPLER_PARENTBASED_RATIO: &str = "parentbased_traceidratio";

#[derive(Debug, Clone)]
pub struct OtelConfig {
    pub service_name: String,
    pub service_version: String,
    pub service_namespace: String,
    pub deployment_environment: String,
    /// OTLP gRPC endpoint. Tracing is disabled when empty.
    pub otlp_endpoint: String,
    pub insecure: bool,
    pub sampler: String,
    pub sampler_arg: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown_service".to_string(),
            service_version: String::new(),
            service_namespace: "default".to_string(),
            deployment_environment: "all".to_string(),
            otlp_endpoint: String::new(),
            insecure: true,
            sampler: SAMPLER_PARENTBASED_RATIO.to_string(),
            sampler_arg: "1.0".to_string(),
        }
    }
}

/// Install the OTLP batch exporter and return its tracer, or `None` when
/// no endpoint is configured.
pub fn init_tracer(config: &OtelConfig) -> Result<Option<sdktrace::Tracer>, Error> {
    if config.otlp_endpoint.is_empty() {
        return Ok(None);
    }

    let sampler = build_sampler(&config.sampler, &config.sampler_arg)?;

    let resource = Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("service.namespace", config.service_namespace.clone()),
        KeyValue::new(
            "deployment.environment",
            config.deployment_environment.clone(),
        ),
    ]);

    // The tonic exporter derives TLS from the endpoint scheme.
    let endpoint = if config.otlp_endpoint.contains("://") {
        config.otlp_endpoint.clone()
    } else if config.insecure {
        format!("http://{}", config.otlp_endpoint)
    } else {
        format!("https://{}", config.otlp_endpoint)
    };

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
        .with_trace_config(
            sdktrace::config()
                .with_sampler(sampler)
                .with_resource(resource),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    Ok(Some(tracer))
}

/// Flush and shut the global tracer provider down.
pub fn shutdown_tracer() {
    opentelemetry::global::shutdown_tracer_provider();
}

fn build_sampler(name: &str, arg: &str) -> Result<sdktrace::Sampler, Error> {
    match name {
        SAMPLER_ALWAYS_ON => Ok(sdktrace::Sampler::AlwaysOn),
        SAMPLER_ALWAYS_OFF => Ok(sdktrace::Sampler::AlwaysOff),
        SAMPLER_PARENTBASED_RATIO => {
            let ratio: f64 = arg.parse().map_err(|_| Error::InvalidSamplerArg {
                sampler: name.to_string(),
                arg: arg.to_string(),
            })?;
            Ok(sdktrace::Sampler::ParentBased(Box::new(
                sdktrace::Sampler::TraceIdRatioBased(ratio),
            )))
        }
        other => Err(Error::InvalidSampler(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognised_samplers_build() {
        assert!(matches!(
            build_sampler(SAMPLER_ALWAYS_ON, "").unwrap(),
            sdktrace::Sampler::AlwaysOn
        ));
        assert!(matches!(
            build_sampler(SAMPLER_ALWAYS_OFF, "").unwrap(),
            sdktrace::Sampler::AlwaysOff
        ));
        assert!(matches!(
            build_sampler(SAMPLER_PARENTBASED_RATIO, "0.25").unwrap(),
            sdktrace::Sampler::ParentBased(_)
        ));
    }

    #[test]
    fn bad_samplers_are_rejected() {
        assert!(build_sampler("jaeger_remote", "").is_err());
        assert!(build_sampler(SAMPLER_PARENTBASED_RATIO, "not-a-ratio").is_err());
    }

    #[test]
    fn no_endpoint_disables_tracing() {
        let tracer = init_tracer(&OtelConfig::default()).unwrap();
        assert!(tracer.is_none());
    }
}
