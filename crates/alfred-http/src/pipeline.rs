//! Per-request serve pipeline: read, populate helpers, script update,
//! substitute, delay, script shaping, write, fan out actions.

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use http::{HeaderName, HeaderValue, StatusCode};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

use alfred_core::helper::populate::{
    populate_date_helpers, populate_path_helpers, populate_random_helpers,
    populate_request_helpers,
};
use alfred_core::{replace_helpers, Helper, Mock, Req, Res};

use crate::rewrite::{OriginalUri, PathCaptures};
use crate::state::AppState;
use crate::{actions, unmatched_response};

/// Serve one request with the given mock. The mock is snapshotted under a
/// short read lock, so a concurrent patch is observed either entirely or
/// not at all.
pub async fn serve_mock(
    state: AppState,
    mock_handle: Arc<RwLock<Mock>>,
    req: Request,
) -> Response {
    let mock = mock_handle.read().clone();
    let span = tracing::info_span!("serve-mock", mock_name = %mock.name());

    async move {
        let (parts, body) = req.into_parts();

        let bytes = match axum::body::to_bytes(body, usize::MAX)
            .instrument(tracing::debug_span!("read-body"))
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(mock_name = %mock.name(), "failed to read request body: {e}");
                return unmatched_response(StatusCode::INTERNAL_SERVER_ERROR, "body read failed");
            }
        };

        let original_uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());

        let mut script_req = Req::new(
            parts.method.to_string(),
            original_uri.to_string(),
            String::from_utf8_lossy(&bytes).into_owned(),
        );
        script_req.set_headers(&parts.headers);
        script_req.set_query(
            url::form_urlencoded::parse(original_uri.query().unwrap_or("").as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );

        tracing::debug!(
            request_path = %original_uri,
            request_body = %script_req.body,
            mock_conf = %String::from_utf8_lossy(mock.json_bytes()),
            "received a mock request, going to use mock '{}'",
            mock.name()
        );

        let mut res = Res {
            status: mock.response.status,
            body: mock.response.body.clone(),
            headers: HashMap::new(),
        };

        // Population order is fixed: path, request, date, random.
        let mut helpers_populated: Vec<Helper> = Vec::new();
        if mock.has_helpers() {
            if mock.has_path_helpers() {
                let captures = parts
                    .extensions
                    .get::<PathCaptures>()
                    .cloned()
                    .unwrap_or_default();
                let span = tracing::debug_span!("populate-path-helpers");
                helpers_populated
                    .extend(span.in_scope(|| populate_path_helpers(&captures.0, mock.path_helpers())));
            }
            if mock.has_request_helpers() {
                let mut query_map = HashMap::new();
                for (key, value) in
                    url::form_urlencoded::parse(original_uri.query().unwrap_or("").as_bytes())
                {
                    query_map.entry(key.into_owned()).or_insert(value.into_owned());
                }
                let span = tracing::debug_span!("populate-request-helpers");
                helpers_populated.extend(span.in_scope(|| {
                    populate_request_helpers(
                        &bytes,
                        &parts.headers,
                        &query_map,
                        mock.request_helpers(),
                    )
                }));
            }
            if mock.has_date_helpers() {
                let span = tracing::debug_span!("populate-date-helpers");
                helpers_populated
                    .extend(span.in_scope(|| populate_date_helpers(mock.date_helpers())));
            }
            if mock.has_random_helpers() {
                let span = tracing::debug_span!("populate-random-helpers");
                helpers_populated
                    .extend(span.in_scope(|| populate_random_helpers(mock.random_helpers())));
            }
            tracing::debug!(
                mock_name = %mock.name(),
                helpers = %alfred_core::helper::helpers_json_string(&helpers_populated),
                "helper(s) populated"
            );
        }

        // Pre-substitution script hook.
        if let Some(script) = named_script(&state, &mock) {
            if script.has_update_helpers {
                let result = script
                    .update_helpers(&state.pool, helpers_populated.clone())
                    .instrument(tracing::debug_span!("script-update-helpers"))
                    .await;
                match result {
                    Ok(updated) => helpers_populated = updated,
                    Err(e) => tracing::error!(
                        mock_name = %mock.name(),
                        "updateHelpers failed, keeping populated helpers: {e}"
                    ),
                }
            }
        }

        res.body = replace_helpers(&res.body, &helpers_populated);
        for (key, value) in &mock.response.headers {
            res.set_header(key.clone(), replace_helpers(value, &helpers_populated));
        }
        res.status = mock.response.status;

        let delay = mock.delay() + state.global_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay)
                .instrument(tracing::debug_span!("response-delay", delay_ms = delay.as_millis() as u64))
                .await;
        }

        // Post-delay script hook shapes the final response.
        if let Some(script) = named_script(&state, &mock) {
            if script.has_alfred {
                let result = script
                    .alfred(&state.pool, &mock, &helpers_populated, &script_req, &res)
                    .instrument(tracing::debug_span!("script-alfred"))
                    .await;
                match result {
                    Ok(shaped) => res = shaped,
                    Err(e) => tracing::error!(
                        mock_name = %mock.name(),
                        "alfred function failed, serving the unshaped response: {e}"
                    ),
                }
            }
        }

        actions::dispatch(&state, &mock, &helpers_populated);

        write_response(&mock, res)
    }
    .instrument(span)
    .await
}

fn named_script<'a>(
    state: &'a AppState,
    mock: &Mock,
) -> Option<&'a alfred_core::Script> {
    let file = mock.function_file.as_deref()?;
    if file.is_empty() {
        return None;
    }
    match state.scripts.get(file) {
        Ok(script) => Some(script),
        Err(e) => {
            tracing::error!(mock_name = %mock.name(), "function file lookup failed: {e}");
            None
        }
    }
}

fn write_response(mock: &Mock, res: Res) -> Response {
    let status = StatusCode::from_u16(res.status).unwrap_or_else(|_| {
        tracing::warn!(
            mock_name = %mock.name(),
            "invalid response status {}, serving 500",
            res.status
        );
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut builder = Response::builder().status(status);
    for (key, value) in &res.headers {
        match (
            key.parse::<HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(header_value)) => {
                builder = builder.header(name, header_value);
            }
            _ => tracing::warn!(
                mock_name = %mock.name(),
                "skipping invalid response header '{key}: {value}'"
            ),
        }
    }

    builder
        .body(Body::from(res.body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
