//! Configuration for the Alfred server.
//!
//! Configuration is read from a JSON file (`configs/config.json` by
//! default) and every key can be overridden through environment variables
//! using the `.`/`-` to `_` mapping: `alfred.core.mocks-dir` becomes
//! `ALFRED_CORE_MOCKS_DIR`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

pub const DEFAULT_NAME: &str = "alfred-mock";
pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_MOCKS_DIR: &str = "user-files/mocks";
pub const DEFAULT_FUNCTIONS_DIR: &str = "user-files/functions";
pub const DEFAULT_BODIES_DIR: &str = "user-files/bodies";
pub const DEFAULT_LISTEN_INTERFACE: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: &str = "8080";

/// Whole configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub alfred: AlfredConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AlfredConfig {
    pub name: String,
    pub version: String,
    pub namespace: String,
    pub environment: String,
    pub log_level: String,
    pub core: CoreConfig,
    pub prometheus: PrometheusConfig,
    pub tracing: TracingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CoreConfig {
    pub mocks_dir: String,
    pub functions_dir: String,
    pub body_files_dir: String,
    pub listen: ListenConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct ListenConfig {
    pub ip: String,
    pub port: String,
    pub enable_tls: bool,
    pub tls_cert_path: String,
    pub tls_key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PrometheusConfig {
    pub enable: bool,
    pub path: String,
    pub slow_time_seconds: u64,
    pub listen: ListenConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TracingConfig {
    pub otlp_endpoint: String,
    pub insecure: bool,
    pub sampler: String,
    pub sampler_args: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alfred: AlfredConfig::default(),
        }
    }
}

impl Default for AlfredConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            version: DEFAULT_VERSION.to_string(),
            namespace: String::new(),
            environment: String::new(),
            log_level: "info".to_string(),
            core: CoreConfig::default(),
            prometheus: PrometheusConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            mocks_dir: DEFAULT_MOCKS_DIR.to_string(),
            functions_dir: DEFAULT_FUNCTIONS_DIR.to_string(),
            body_files_dir: DEFAULT_BODIES_DIR.to_string(),
            listen: ListenConfig {
                ip: DEFAULT_LISTEN_INTERFACE.to_string(),
                port: DEFAULT_LISTEN_PORT.to_string(),
                ..ListenConfig::default()
            },
        }
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            path: "/metrics".to_string(),
            slow_time_seconds: 5,
            listen: ListenConfig::default(),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            insecure: true,
            sampler: "parentbased_traceidratio".to_string(),
            sampler_args: "1.0".to_string(),
        }
    }
}

impl ListenConfig {
    /// Socket address string this listener binds to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn is_configured(&self) -> bool {
        !self.port.is_empty()
    }
}

/// Load configuration from a JSON file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(&path).map_err(|e| {
        crate::Error::config(format!(
            "failed to read config file {:?}: {e}",
            path.as_ref()
        ))
    })?;
    let config: Config = serde_json::from_str(&content).map_err(|e| {
        crate::Error::config(format!(
            "failed to parse config file {:?}: {e}",
            path.as_ref()
        ))
    })?;
    Ok(config)
}

/// Load configuration with fallback to defaults.
pub fn load_config_with_fallback<P: AsRef<Path>>(path: P) -> Config {
    match load_config(&path) {
        Ok(config) => {
            tracing::info!("loaded configuration from {:?}", path.as_ref());
            config
        }
        Err(e) => {
            tracing::warn!(
                "failed to load config from {:?}: {e}. Using defaults.",
                path.as_ref()
            );
            Config::default()
        }
    }
}

fn env_string(key: &str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn env_bool(key: &str, target: &mut bool) {
    if let Ok(value) = std::env::var(key) {
        *target = value == "1" || value.eq_ignore_ascii_case("true");
    }
}

/// Environment variable overrides for configuration. Environment variables
/// supersede the values retrieved from the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    env_string("ALFRED_NAME", &mut config.alfred.name);
    env_string("ALFRED_VERSION", &mut config.alfred.version);
    env_string("ALFRED_NAMESPACE", &mut config.alfred.namespace);
    env_string("ALFRED_ENVIRONMENT", &mut config.alfred.environment);
    env_string("ALFRED_LOG_LEVEL", &mut config.alfred.log_level);

    env_string("ALFRED_CORE_MOCKS_DIR", &mut config.alfred.core.mocks_dir);
    env_string(
        "ALFRED_CORE_FUNCTIONS_DIR",
        &mut config.alfred.core.functions_dir,
    );
    env_string(
        "ALFRED_CORE_BODY_FILES_DIR",
        &mut config.alfred.core.body_files_dir,
    );
    env_string("ALFRED_CORE_LISTEN_IP", &mut config.alfred.core.listen.ip);
    env_string(
        "ALFRED_CORE_LISTEN_PORT",
        &mut config.alfred.core.listen.port,
    );
    env_bool(
        "ALFRED_CORE_LISTEN_ENABLE_TLS",
        &mut config.alfred.core.listen.enable_tls,
    );
    env_string(
        "ALFRED_CORE_LISTEN_TLS_CERT_PATH",
        &mut config.alfred.core.listen.tls_cert_path,
    );
    env_string(
        "ALFRED_CORE_LISTEN_TLS_KEY_PATH",
        &mut config.alfred.core.listen.tls_key_path,
    );

    env_bool("ALFRED_PROMETHEUS_ENABLE", &mut config.alfred.prometheus.enable);
    env_string("ALFRED_PROMETHEUS_PATH", &mut config.alfred.prometheus.path);
    if let Ok(value) = std::env::var("ALFRED_PROMETHEUS_SLOW_TIME_SECONDS") {
        if let Ok(seconds) = value.parse() {
            config.alfred.prometheus.slow_time_seconds = seconds;
        }
    }
    env_string(
        "ALFRED_PROMETHEUS_LISTEN_IP",
        &mut config.alfred.prometheus.listen.ip,
    );
    env_string(
        "ALFRED_PROMETHEUS_LISTEN_PORT",
        &mut config.alfred.prometheus.listen.port,
    );

    env_string(
        "ALFRED_TRACING_OTLP_ENDPOINT",
        &mut config.alfred.tracing.otlp_endpoint,
    );
    env_bool("ALFRED_TRACING_INSECURE", &mut config.alfred.tracing.insecure);
    env_string("ALFRED_TRACING_SAMPLER", &mut config.alfred.tracing.sampler);
    env_string(
        "ALFRED_TRACING_SAMPLER_ARGS",
        &mut config.alfred.tracing.sampler_args,
    );

    config
}
