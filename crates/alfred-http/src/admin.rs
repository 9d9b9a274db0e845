//! Control endpoints: mock listing, runtime log level, global delay,
//! mock patching. They live on the same listener as the mocks, in the
//! method-prefixed composite space.

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use alfred_core::patch_mock;

use crate::state::AppState;

/// `GET /` — the mock listing.
pub async fn list_mocks(state: AppState) -> Json<serde_json::Value> {
    Json(state.mocks.info_list())
}

#[derive(Debug, Deserialize)]
struct ChangeLogLevelRequest {
    #[serde(rename = "configuredLevel")]
    configured_level: String,
}

#[derive(Debug, Serialize)]
struct ChangeLogLevelResponse {
    #[serde(rename = "previousLevel")]
    previous_level: String,
    #[serde(rename = "configuredLevel")]
    configured_level: String,
    #[serde(rename = "effectiveLevel")]
    effective_level: String,
}

/// `POST /logger` — change the log level at runtime. Unknown levels are
/// refused with a 403.
pub async fn change_log_level(body: Bytes) -> Response {
    let payload: ChangeLogLevelRequest = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("received json unmarshal fail: {e}");
            return (StatusCode::BAD_REQUEST, format!("bad payload: {e}")).into_response();
        }
    };

    let previous_level = alfred_observability::current_level();
    let result = alfred_observability::set_level(&payload.configured_level);
    let response = ChangeLogLevelResponse {
        previous_level,
        configured_level: payload.configured_level,
        effective_level: alfred_observability::current_level(),
    };

    if let Err(e) = result {
        return (StatusCode::FORBIDDEN, e.to_string()).into_response();
    }
    Json(response).into_response()
}

#[derive(Debug, Deserialize)]
struct GlobalDelayPayload {
    #[serde(rename = "minResponseTime", default)]
    response_time: u64,
    #[serde(default)]
    duration: u64,
}

/// `POST /alfred/delay` — inject a global delay window. Concurrent calls
/// overwrite the value and spawn additional reset tasks; the last reset
/// to fire wins.
pub async fn delay_mocks(state: AppState, body: Bytes) -> Response {
    let payload: GlobalDelayPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("received json unmarshal fail: {e}");
            return (StatusCode::BAD_REQUEST, format!("bad payload: {e}")).into_response();
        }
    };

    state.set_global_delay(payload.response_time);
    tracing::info!(
        "a global response time offset of {}ms has been set for {}ms",
        payload.response_time,
        payload.duration
    );

    let reset_state = state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(payload.duration)).await;
        reset_state.set_global_delay(0);
        tracing::info!("global response time offset reset");
    });

    StatusCode::OK.into_response()
}

/// `PATCH /alfred` — merge-patch a mock by name. An unknown name answers
/// 200 with the mock listing: informational, not an error.
pub async fn patch_mock_endpoint(state: AppState, body: Bytes) -> Response {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("received json unmarshal fail: {e}");
            return (StatusCode::BAD_REQUEST, format!("bad payload: {e}")).into_response();
        }
    };
    let name = payload["name"].as_str().unwrap_or_default();

    if let Some(mock_handle) = state.mocks.find_by_name(name) {
        let bodies_dir = state.bodies_dir();
        let mut mock = mock_handle.write();
        let before = String::from_utf8_lossy(mock.json_bytes()).into_owned();

        if let Err(e) = patch_mock(&mut mock, &body, bodies_dir.as_deref()) {
            tracing::error!(mock_name = %name, "mock patch error: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("mock patch error: {e}"),
            )
                .into_response();
        }

        tracing::info!(
            mock_name = %mock.name(),
            mock_conf_before = %before,
            mock_conf_after = %String::from_utf8_lossy(mock.json_bytes()),
            "mock has been patched"
        );
        return Json(serde_json::to_value(&*mock).unwrap_or_default()).into_response();
    }

    let listing = serde_json::to_string_pretty(&state.mocks.info_list()).unwrap_or_default();
    (
        StatusCode::OK,
        format!(
            "Hello Sir ! This mock does not exists, however, I've found this mock list, if it can help: \n{listing}\n (Alfred)"
        ),
    )
        .into_response()
}
