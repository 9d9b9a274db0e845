//! Mock construction from raw JSON bytes.

use regex::Regex;
use std::path::Path;

use super::Mock;
use crate::helper::build_helpers;
use crate::{Error, Result};

/// Build one mock from the bytes of a mock file.
///
/// The original JSON is compacted and kept on the mock; `body-file` is
/// inlined from the bodies directory; the path regex is compiled anchored;
/// helpers are discovered once, from the compacted JSON plus the inlined
/// body, and bucketed by kind.
pub fn build_mock_from_json(json: &[u8], bodies_dir: Option<&Path>) -> Result<Mock> {
    let mut mock: Mock = serde_json::from_slice(json)?;

    let compact: serde_json::Value = serde_json::from_slice(json)?;
    mock.set_json_bytes(serde_json::to_vec(&compact)?);

    let mut helper_buffer = mock.json_bytes().to_vec();

    if let Some(body_file) = mock.response.body_file.clone() {
        let dir = bodies_dir.ok_or_else(|| {
            Error::mock(format!(
                "mock '{}' uses body-file but no bodies directory is configured",
                mock.name()
            ))
        })?;
        let path = dir.join(&body_file);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::mock(format!(
                "mock '{}': cannot read body-file {path:?}: {e}",
                mock.name()
            ))
        })?;
        helper_buffer.extend_from_slice(content.as_bytes());
        mock.response.body = content;
    }

    if mock.has_url_regex() {
        // Anchoring twice is harmless, so user-provided anchors are fine.
        let pattern = format!("^{}$", mock.request.url_regex);
        mock.set_compiled_regex(Regex::new(&pattern)?);
    }

    for helper in build_helpers(&helper_buffer)? {
        tracing::debug!(
            mock_name = %mock.name(),
            helper = %helper.json_string(),
            "helper '{}' found: '{}' of kind '{}'",
            helper.name,
            helper.target,
            helper.kind.as_str(),
        );
        mock.add_helper(helper);
    }

    Ok(mock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_helpers_by_kind() {
        let raw = br#"{
            "name": "bucketed",
            "request": { "method": "POST", "url": "/x" },
            "response": {
                "status": 200,
                "body": "{{ alfred.req.a }} {{ alfred.time.now }} {{ alfred.random.RandomInt }} {{ alfred.path.1 }}",
                "headers": { "x-req": "{{ alfred.req.b }}" }
            }
        }"#;
        let mock = build_mock_from_json(raw, None).unwrap();
        assert_eq!(mock.request_helpers().len(), 2);
        assert_eq!(mock.date_helpers().len(), 1);
        assert_eq!(mock.random_helpers().len(), 1);
        assert_eq!(mock.path_helpers().len(), 1);
        assert!(mock.has_helpers());
    }

    #[test]
    fn compacts_the_original_json() {
        let raw = br#"{ "name" : "c",
            "request": { "url": "/c" } }"#;
        let mock = build_mock_from_json(raw, None).unwrap();
        let compact = String::from_utf8(mock.json_bytes().to_vec()).unwrap();
        assert!(!compact.contains('\n'));
        assert!(compact.contains(r#""name":"c""#));
    }

    #[test]
    fn inlines_body_file_and_parses_its_helpers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("answer.json"), r#"{"v":"{{ alfred.req.id }}"}"#)
            .unwrap();

        let raw = br#"{
            "name": "filed",
            "request": { "url": "/f" },
            "response": { "status": 200, "body-file": "answer.json" }
        }"#;
        let mock = build_mock_from_json(raw, Some(dir.path())).unwrap();
        assert_eq!(mock.response.body, r#"{"v":"{{ alfred.req.id }}"}"#);
        assert_eq!(mock.request_helpers().len(), 1);
    }

    #[test]
    fn missing_body_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let raw = br#"{"request":{"url":"/f"},"response":{"body-file":"absent.json"}}"#;
        assert!(build_mock_from_json(raw, Some(dir.path())).is_err());
    }

    #[test]
    fn regex_is_compiled_anchored() {
        let raw = br#"{"request":{"method":"GET","urlRegex":"/users/([0-9]+)"}}"#;
        let mock = build_mock_from_json(raw, None).unwrap();
        let regex = mock.compiled_regex().unwrap();
        assert!(regex.is_match("/users/42"));
        assert!(!regex.is_match("/api/users/42/extra"));
    }

    #[test]
    fn malformed_helper_aborts_the_build() {
        let raw = br#"{"request":{"url":"/x"},"response":{"body":"{{ alfred.nope.a }}"}}"#;
        assert!(build_mock_from_json(raw, None).is_err());
    }
}
