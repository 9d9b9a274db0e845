//! URI rewriting that happens before routing.
//!
//! Every mock registers under a composite path carrying its method, so
//! the first rewrite prefixes the request method onto the path and plain
//! exact matching does the dispatch. The second rewrite — installed only
//! when at least one mock has a regex path — walks the mocks in load
//! order and sends the first regex match to its registered composite,
//! threading the capture mapping and the original URI through request
//! extensions.

use axum::extract::Request;
use http::Uri;
use std::collections::HashMap;

use crate::state::AppState;

/// The URI as the caller sent it, before any rewriting.
#[derive(Debug, Clone)]
pub struct OriginalUri(pub Uri);

/// Path-regex capture mapping for the matched mock: helper token ->
/// captured substring.
#[derive(Debug, Clone, Default)]
pub struct PathCaptures(pub HashMap<String, String>);

/// Composite path for a literal mock: `/<METHOD><url>`.
pub fn literal_composite(method: &str, url: &str) -> String {
    if url.starts_with('/') {
        format!("/{method}{url}")
    } else {
        format!("/{method}/{url}")
    }
}

/// Composite path for a regex mock: `/<METHOD>/<urlencode(pattern)>`.
/// Encoding makes the pattern a single literal path segment, so the
/// router never interprets it.
pub fn regex_composite(method: &str, pattern: &str) -> String {
    format!("/{method}/{}", urlencoding::encode(pattern))
}

/// Prefix the request method onto the path and stash the original URI.
pub async fn method_prefix(mut req: Request) -> Request {
    let original = req.uri().clone();
    req.extensions_mut().insert(OriginalUri(original.clone()));

    let method = req.method().as_str().to_string();
    let query = original
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    set_path(&mut req, format!("/{method}{}{query}", original.path()));
    req
}

/// Rewrite a request whose raw path matches a regex mock to that mock's
/// composite path; first match in load order wins. A no-op for literal
/// mocks.
pub async fn regex_rewrite(state: AppState, mut req: Request) -> Request {
    let raw_path = match req.extensions().get::<OriginalUri>() {
        Some(original) => original.0.path().to_string(),
        None => req.uri().path().to_string(),
    };
    let method = req.method().as_str().to_string();

    for mock_handle in state.mocks.iter() {
        let mock = mock_handle.read();
        if !mock.has_url_regex() || mock.method() != method {
            continue;
        }
        let Some(regex) = mock.compiled_regex() else { continue };
        let Some(captures) = regex.captures(&raw_path) else { continue };

        let mut mapping = HashMap::new();
        for helper in mock.path_helpers() {
            let Ok(index) = helper.target.parse::<usize>() else { continue };
            if let Some(group) = captures.get(index) {
                mapping.insert(helper.string.clone(), group.as_str().to_string());
            }
        }

        let composite = regex_composite(&mock.method(), &mock.request.url_regex);
        let query = req
            .extensions()
            .get::<OriginalUri>()
            .and_then(|original| original.0.query())
            .map(|q| format!("?{q}"))
            .unwrap_or_default();
        drop(mock);

        req.extensions_mut().insert(PathCaptures(mapping));
        set_path(&mut req, format!("{composite}{query}"));
        return req;
    }
    req
}

fn set_path(req: &mut Request, path_and_query: String) {
    let mut parts = req.uri().clone().into_parts();
    match path_and_query.parse() {
        Ok(new_path) => {
            parts.path_and_query = Some(new_path);
            if let Ok(uri) = Uri::from_parts(parts) {
                *req.uri_mut() = uri;
            }
        }
        Err(e) => tracing::warn!("cannot rewrite request path to '{path_and_query}': {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn method_prefix_folds_method_into_the_path() {
        let req = Request::builder()
            .method("POST")
            .uri("/echo?a=1")
            .body(Body::empty())
            .unwrap();
        let req = method_prefix(req).await;
        assert_eq!(req.uri().path(), "/POST/echo");
        assert_eq!(req.uri().query(), Some("a=1"));
        assert_eq!(
            req.extensions().get::<OriginalUri>().unwrap().0.path(),
            "/echo"
        );
    }

    #[test]
    fn composites_are_stable() {
        assert_eq!(literal_composite("GET", "/users"), "/GET/users");
        assert_eq!(
            regex_composite("GET", "/users/([0-9]+)"),
            format!("/GET/{}", urlencoding::encode("/users/([0-9]+)"))
        );
    }
}
