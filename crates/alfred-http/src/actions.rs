//! Detached outbound action dispatch.
//!
//! Actions run after the response on their own tasks: the span created
//! here keeps trace correlation with the serving request, while the
//! spawned task has no cancellation linkage to it. The tracker guard
//! lets shutdown wait for in-flight actions.

use tracing::Instrument;

use alfred_core::action::create_request_from_action;
use alfred_core::{Helper, Mock};

use crate::state::AppState;

pub fn dispatch(state: &AppState, mock: &Mock, helpers: &[Helper]) {
    for action in mock.actions.clone() {
        let state = state.clone();
        let helpers = helpers.to_vec();
        let mock_name = mock.name();
        let guard = state.actions.guard();
        let span = tracing::info_span!(
            "mock-action",
            mock_name = %mock_name,
            action_url = %action.url
        );

        tokio::spawn(
            async move {
                let _guard = guard;
                let delay = action.delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                let outbound = match create_request_from_action(&action, &helpers) {
                    Ok(outbound) => outbound,
                    Err(e) => {
                        tracing::warn!(mock_name = %mock_name, "cannot build action request: {e}");
                        return;
                    }
                };

                match outbound.send(&state.client).await {
                    Ok(response) => tracing::debug!(
                        mock_name = %mock_name,
                        status = response.status,
                        "action request sent"
                    ),
                    Err(e) => {
                        tracing::warn!(mock_name = %mock_name, "action request failed: {e}");
                    }
                }
            }
            .instrument(span),
        );
    }
}
