//! Turning a mock action into an outbound request.

use crate::helper::{replace_helpers, Helper};
use crate::mock::MockAction;
use crate::outbound::OutboundRequest;
use crate::{Error, Result};

pub const SEND_REQUEST_TYPE: &str = "send-request";
pub const SEND_REQUEST_DEFAULT_METHOD: &str = "GET";

/// Build the outbound request for a `send-request` action, applying helper
/// substitution to the URL, the body and every header key and value.
pub fn create_request_from_action(
    action: &MockAction,
    helpers: &[Helper],
) -> Result<OutboundRequest> {
    if action.kind != SEND_REQUEST_TYPE {
        return Err(Error::action(format!(
            "'{}' can't generate a send request action, type has to be: {SEND_REQUEST_TYPE}",
            action.kind
        )));
    }

    let url = replace_helpers(&action.url, helpers);
    if url.is_empty() {
        return Err(Error::action("empty action request url"));
    }
    let body = replace_helpers(&action.body, helpers);
    let headers = action
        .headers
        .iter()
        .map(|(key, value)| {
            (
                replace_helpers(key, helpers),
                replace_helpers(value, helpers),
            )
        })
        .collect();

    let method = if action.method.is_empty() {
        SEND_REQUEST_DEFAULT_METHOD
    } else {
        &action.method
    };

    OutboundRequest::new(method, &url, body, headers, &action.timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::HelperKind;
    use std::collections::HashMap;

    fn helper(token: &str, value: &str) -> Helper {
        Helper {
            kind: HelperKind::Request,
            string: token.to_string(),
            value: value.to_string(),
            ..Helper::default()
        }
    }

    fn action(url: &str, body: &str) -> MockAction {
        MockAction {
            kind: SEND_REQUEST_TYPE.to_string(),
            url: url.to_string(),
            body: body.to_string(),
            headers: HashMap::from([(
                "x-id".to_string(),
                "{{ alfred.req.id }}".to_string(),
            )]),
            ..MockAction::default()
        }
    }

    #[test]
    fn substitutes_helpers_everywhere() {
        let helpers = vec![helper("{{ alfred.req.id }}", "abc")];
        let request = create_request_from_action(
            &action("http://sink/{{ alfred.req.id }}", "id={{ alfred.req.id }}"),
            &helpers,
        )
        .unwrap();

        assert_eq!(request.base_url().path(), "/abc");
        assert_eq!(request.body, "id=abc");
        assert_eq!(request.headers["x-id"], "abc");
    }

    #[test]
    fn method_defaults_to_get() {
        let helpers = vec![];
        let request = create_request_from_action(&action("http://sink/", ""), &helpers).unwrap();
        assert_eq!(request.base_url().as_str(), "http://sink/");
    }

    #[test]
    fn unknown_action_type_is_rejected() {
        let mut bad = action("http://sink/", "");
        bad.kind = "fire-missiles".to_string();
        assert!(create_request_from_action(&bad, &[]).is_err());
    }

    #[test]
    fn scheduled_delay_follows_response_delay_semantics() {
        let mut a = action("http://sink/", "");
        a.min_scheduled_time = 50;
        a.max_scheduled_time = 50;
        assert_eq!(a.delay(), std::time::Duration::from_millis(50));
    }
}
