//! Access-log middleware, one info line per served request.

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use std::time::Instant;

use crate::rewrite::OriginalUri;

pub async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let version = format!("{:?}", req.version());
    let (path, query) = match req.extensions().get::<OriginalUri>() {
        Some(original) => (
            original.0.path().to_string(),
            original.0.query().unwrap_or("").to_string(),
        ),
        None => (
            req.uri().path().to_string(),
            req.uri().query().unwrap_or("").to_string(),
        ),
    };
    // Present when the server was started with connect info; absent in
    // in-process tests.
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    tracing::info!(
        ip = %ip,
        status = status,
        duration = %format!("{:?}", start.elapsed()),
        "{method} {version} {path}?{query} {status}"
    );
    response
}
