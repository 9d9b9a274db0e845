//! Runtime mock patching (the `PATCH /alfred` control endpoint).

use std::path::Path;

use super::{build_mock_from_json, Mock};
use crate::Result;

/// Deep-merge a JSON partial onto the mock's stored JSON (RFC 7386 merge
/// semantics), rebuild the mock from the merged document — re-parsing
/// helpers and recompiling the path regex — and swap the fields in place.
///
/// Patching a mock with its own serialisation is a no-op.
pub fn patch_mock(mock: &mut Mock, patch: &[u8], bodies_dir: Option<&Path>) -> Result<()> {
    let mut merged: serde_json::Value = serde_json::from_slice(mock.json_bytes())?;
    let patch_value: serde_json::Value = serde_json::from_slice(patch)?;
    json_patch::merge(&mut merged, &patch_value);

    *mock = build_mock_from_json(&serde_json::to_vec(&merged)?, bodies_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mock() -> Mock {
        build_mock_from_json(
            br#"{
                "name": "patchable",
                "request": { "method": "POST", "url": "/p" },
                "response": {
                    "status": 200,
                    "body": "{{ alfred.req.a }}",
                    "headers": { "content-type": "text/plain" },
                    "minResponseTime": 5,
                    "maxResponseTime": 10
                }
            }"#,
            None,
        )
        .unwrap()
    }

    #[test]
    fn patch_merges_and_reparses_helpers() {
        let mut mock = sample_mock();
        patch_mock(
            &mut mock,
            br#"{"name":"patchable","response":{"body":"{{ alfred.req.a }} {{ alfred.req.b }}","status":201}}"#,
            None,
        )
        .unwrap();

        assert_eq!(mock.response.status, 201);
        assert_eq!(mock.request_helpers().len(), 2);
        // untouched fields survive the merge
        assert_eq!(mock.response.min_response_time, 5);
        assert_eq!(mock.response.headers["content-type"], "text/plain");
    }

    #[test]
    fn patch_with_own_serialisation_is_a_noop() {
        let mut mock = sample_mock();
        let serialized = serde_json::to_vec(&mock).unwrap();
        let before = serde_json::to_value(&mock).unwrap();
        let helpers_before = mock.request_helpers().len();

        patch_mock(&mut mock, &serialized, None).unwrap();

        assert_eq!(serde_json::to_value(&mock).unwrap(), before);
        assert_eq!(mock.request_helpers().len(), helpers_before);
    }

    #[test]
    fn bad_patch_leaves_an_error() {
        let mut mock = sample_mock();
        assert!(patch_mock(&mut mock, b"{bad json", None).is_err());
    }
}
