//! HTTP layer of the Alfred mock server.
//!
//! Mocks and control endpoints share one listener. Routing happens in a
//! method-prefixed composite space: a rewrite wrapped around the router
//! folds the request method into the path before dispatch, and a second
//! rewrite (present only when regex mocks are loaded) sends regex matches
//! to their registered composite path.

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, patch, post};
use axum::Router;
use http::StatusCode;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use alfred_core::config::ListenConfig;
use alfred_core::{Error, Result};
use alfred_observability::MetricsRegistry;

pub mod access_log;
pub mod actions;
pub mod admin;
pub mod pipeline;
pub mod rewrite;
pub mod state;

pub use state::AppState;

/// Build the full router: control endpoints, optional metrics, one route
/// per mock, middleware stack, and the pre-routing rewrites.
pub fn build_router(state: AppState) -> Router {
    let mut inner = Router::new();

    {
        let s = state.clone();
        inner = inner.route("/GET/", get(move || admin::list_mocks(s.clone())));
    }
    inner = inner.route("/POST/logger", post(admin::change_log_level));
    {
        let s = state.clone();
        inner = inner.route(
            "/POST/alfred/delay",
            post(move |body: Bytes| admin::delay_mocks(s.clone(), body)),
        );
    }
    {
        let s = state.clone();
        inner = inner.route(
            "/PATCH/alfred",
            patch(move |body: Bytes| admin::patch_mock_endpoint(s.clone(), body)),
        );
    }

    let prometheus = &state.config.alfred.prometheus;
    if prometheus.enable && !prometheus.listen.is_configured() {
        if let Some(metrics) = &state.metrics {
            let composite = format!("/GET{}", prometheus.path);
            inner = inner.merge(alfred_observability::metrics_router(
                Arc::clone(metrics),
                &composite,
            ));
        }
    }

    for mock_handle in state.mocks.iter() {
        let (composite, name) = {
            let mock = mock_handle.read();
            let composite = if mock.has_url_regex() {
                rewrite::regex_composite(&mock.method(), &mock.request.url_regex)
            } else {
                rewrite::literal_composite(&mock.method(), &mock.request.url)
            };
            (composite, mock.name())
        };
        tracing::debug!(mock_name = %name, route = %composite, "creating route for mock");

        let s = state.clone();
        let handle = Arc::clone(mock_handle);
        inner = inner.route(
            &composite,
            any(move |req: Request| pipeline::serve_mock(s.clone(), handle.clone(), req)),
        );
    }

    let metrics = state.metrics.clone();
    let inner = inner
        .layer(axum::middleware::from_fn(access_log::log_requests))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let metrics = metrics.clone();
                async move { track_metrics(metrics, req, next).await }
            },
        ))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http());

    let method_layer = axum::middleware::map_request(rewrite::method_prefix);
    if state.mocks.has_regex_mocks() {
        let s = state.clone();
        let regex_layer = axum::middleware::map_request(move |req: Request| {
            let s = s.clone();
            async move { rewrite::regex_rewrite(s, req).await }
        });
        let service = ServiceBuilder::new()
            .layer(method_layer)
            .layer(regex_layer)
            .service(inner);
        Router::new().fallback_service(service)
    } else {
        let service = ServiceBuilder::new().layer(method_layer).service(inner);
        Router::new().fallback_service(service)
    }
}

/// Bind and serve until the shutdown future resolves, then drain
/// gracefully.
pub async fn serve(
    addr: &str,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("server binding on {addr} failed: {e}")))?;
    tracing::info!("alfred started to serve and is listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| Error::config(format!("server error: {e}")))
}

/// Native TLS termination is not supported; the configuration is
/// validated and the operator pointed at a fronting proxy.
pub fn check_tls_config(listen: &ListenConfig) -> Result<()> {
    if !listen.enable_tls {
        return Ok(());
    }
    for path in [&listen.tls_cert_path, &listen.tls_key_path] {
        if path.is_empty() || !Path::new(path).exists() {
            return Err(Error::config(format!(
                "TLS is enabled but '{path}' does not exist"
            )));
        }
    }
    Err(Error::config(
        "TLS is enabled but native termination is not supported; certificates validated, \
         put a TLS-terminating reverse proxy in front of Alfred",
    ))
}

async fn track_metrics(
    metrics: Option<Arc<MetricsRegistry>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(metrics) = metrics else {
        return next.run(req).await;
    };

    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<rewrite::OriginalUri>()
        .map(|original| original.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;
    metrics.observe(&method, &path, response.status().as_u16(), start.elapsed());
    response
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> http::Response<axum::body::Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!("caught panic while serving a request: {detail}");

    http::Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(axum::body::Body::from("internal server error"))
        .unwrap_or_else(|_| http::Response::new(axum::body::Body::empty()))
}

pub(crate) fn unmatched_response(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}
