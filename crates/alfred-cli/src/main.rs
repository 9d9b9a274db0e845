//! Alfred is a programmable HTTP mock server for performance testing.
//! It manages a mock list, offers helpers, triggers asynchronous actions
//! and wraps users' JavaScript functions; users have infinite creative
//! possibilities.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use alfred_core::{
    apply_env_overrides, create_mock_collection_from_folder,
    create_script_collection_from_folder, load_config_with_fallback, MockRegistry,
    ScriptCollection, VmPool, VmPoolConfig,
};
use alfred_http::{build_router, AppState};
use alfred_observability::{LoggingConfig, MetricsRegistry, OtelConfig};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "alfred")]
#[command(about = "Alfred - a programmable HTTP mock server for performance testing")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "configs/config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = apply_env_overrides(load_config_with_fallback(&cli.config));

    let tracer = alfred_observability::init_tracer(&OtelConfig {
        service_name: config.alfred.name.clone(),
        service_version: config.alfred.version.clone(),
        service_namespace: config.alfred.namespace.clone(),
        deployment_environment: config.alfred.environment.clone(),
        otlp_endpoint: config.alfred.tracing.otlp_endpoint.clone(),
        insecure: config.alfred.tracing.insecure,
        sampler: config.alfred.tracing.sampler.clone(),
        sampler_arg: config.alfred.tracing.sampler_args.clone(),
    })
    .context("tracing setup failed")?;

    alfred_observability::init_logging(
        &LoggingConfig {
            level: config.alfred.log_level.clone(),
            component: config.alfred.name.clone(),
            version: config.alfred.version.clone(),
            plain: false,
        },
        tracer,
    )
    .context("logging setup failed")?;

    tracing::debug!(
        "alfred configuration initialized with: {}",
        serde_json::to_string(&config).unwrap_or_default()
    );

    alfred_http::check_tls_config(&config.alfred.core.listen)
        .context("listener configuration")?;

    let pool = VmPool::new(VmPoolConfig::default()).context("script vm pool setup failed")?;

    let functions_dir = PathBuf::from(&config.alfred.core.functions_dir);
    let scripts = if functions_dir.is_dir() {
        create_script_collection_from_folder(&functions_dir, &pool)
            .await
            .context("function files load failed")?
    } else {
        ScriptCollection::default()
    };
    for script in scripts.iter() {
        if script.has_setup {
            script
                .setup(&pool)
                .await
                .with_context(|| format!("setup() failed in {}", script.file_name))?;
        }
    }

    let bodies_dir = PathBuf::from(&config.alfred.core.body_files_dir);
    let mocks = create_mock_collection_from_folder(
        &PathBuf::from(&config.alfred.core.mocks_dir),
        if bodies_dir.as_os_str().is_empty() {
            None
        } else {
            Some(bodies_dir.as_path())
        },
    )
    .context("mocks load failed")?;
    tracing::info!("mock files loaded - {} mock(s) created", mocks.len());
    let registry = MockRegistry::new(mocks);

    let metrics = if config.alfred.prometheus.enable {
        Some(
            MetricsRegistry::new(config.alfred.prometheus.slow_time_seconds)
                .context("metrics setup failed")?,
        )
    } else {
        None
    };

    let mut state = AppState::new(
        Arc::new(config.clone()),
        registry,
        Arc::new(scripts),
        Arc::clone(&pool),
    );
    if let Some(metrics) = &metrics {
        state = state.with_metrics(Arc::clone(metrics));
    }
    let app = build_router(state.clone());

    // Metrics can live on their own listener, un-prefixed.
    if config.alfred.prometheus.enable && config.alfred.prometheus.listen.is_configured() {
        if let Some(metrics) = metrics {
            let ip = if config.alfred.prometheus.listen.ip.is_empty() {
                "0.0.0.0".to_string()
            } else {
                config.alfred.prometheus.listen.ip.clone()
            };
            let addr = format!("{ip}:{}", config.alfred.prometheus.listen.port);
            let router =
                alfred_observability::metrics_router(metrics, &config.alfred.prometheus.path);
            tokio::spawn(async move {
                match tokio::net::TcpListener::bind(&addr).await {
                    Ok(listener) => {
                        tracing::info!("metrics listening on {addr}");
                        if let Err(e) = axum::serve(listener, router).await {
                            tracing::error!("metrics server error: {e}");
                        }
                    }
                    Err(e) => tracing::error!("metrics binding on {addr} failed: {e}"),
                }
            });
        }
    }

    let addr = config.alfred.core.listen.addr();
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let server = tokio::spawn(async move {
        alfred_http::serve(&addr, app, async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
    });

    shutdown_signal().await;
    tracing::info!("server is stopping");
    let _ = shutdown_tx.send(true);

    // In-flight requests get a graceful window, then the still-running
    // outbound actions get the same deadline.
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(result) => {
            if let Ok(Err(e)) = result {
                tracing::error!("server error during drain: {e}");
            }
        }
        Err(_) => tracing::warn!("graceful drain deadline reached, abandoning requests"),
    }
    if !state.actions.wait_idle(SHUTDOWN_GRACE).await {
        tracing::warn!(
            in_flight = state.actions.in_flight(),
            "action deadline reached, abandoning outbound actions"
        );
    }

    pool.shutdown().await;
    alfred_observability::shutdown_tracer();
    tracing::info!("stopped server");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install the SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
