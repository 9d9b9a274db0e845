//! Outbound HTTP client for mock actions.

use std::collections::HashMap;
use std::time::Duration;

use crate::duration::parse_std_duration;
use crate::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "CONNECT", "HEAD", "OPTIONS", "TRACE",
];

/// A fully-shaped outbound request: validated method and absolute URL,
/// query args split out for re-injection, per-request timeout.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    method: reqwest::Method,
    url: url::Url,
    query: HashMap<String, String>,
    pub body: String,
    pub headers: HashMap<String, String>,
    timeout: Duration,
}

/// Outcome of an outbound send, flattened like the script-facing records.
#[derive(Debug, Clone, Default)]
pub struct OutboundResponse {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl OutboundRequest {
    pub fn new(
        method: &str,
        raw_url: &str,
        body: String,
        headers: HashMap<String, String>,
        timeout: &str,
    ) -> Result<Self> {
        let url = url::Url::parse(raw_url)?;
        if !url.has_host() {
            return Err(Error::action(format!("request url '{raw_url}' not valid")));
        }

        let upper = method.to_uppercase();
        if !METHODS.contains(&upper.as_str()) {
            return Err(Error::action(format!(
                "request method {method} not exists"
            )));
        }
        let method = reqwest::Method::from_bytes(upper.as_bytes())
            .map_err(|_| Error::action(format!("request method {upper} not exists")))?;

        let query: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let timeout = if timeout.is_empty() {
            DEFAULT_TIMEOUT
        } else {
            parse_std_duration(timeout)?
        };

        Ok(Self {
            method,
            url,
            query,
            body,
            headers,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Scheme, host and path, without the query string. Query args are
    /// re-injected at send time.
    pub fn base_url(&self) -> url::Url {
        let mut base = self.url.clone();
        base.set_query(None);
        base
    }

    pub fn query_args(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub async fn send(&self, client: &reqwest::Client) -> Result<OutboundResponse> {
        let mut builder = client
            .request(self.method.clone(), self.base_url())
            .timeout(self.timeout)
            .body(self.body.clone());

        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (key.to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.unwrap_or_default();

        Ok(OutboundResponse {
            status,
            body,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_url_and_method() {
        assert!(OutboundRequest::new("GET", "http://sink/", String::new(), HashMap::new(), "")
            .is_ok());
        assert!(OutboundRequest::new("get", "http://sink/", String::new(), HashMap::new(), "")
            .is_ok());
        assert!(
            OutboundRequest::new("YEET", "http://sink/", String::new(), HashMap::new(), "")
                .is_err()
        );
        assert!(
            OutboundRequest::new("GET", "not-a-url", String::new(), HashMap::new(), "").is_err()
        );
    }

    #[test]
    fn splits_query_args_for_reinjection() {
        let request = OutboundRequest::new(
            "GET",
            "http://sink/path?a=1&b=2",
            String::new(),
            HashMap::new(),
            "",
        )
        .unwrap();
        assert_eq!(request.base_url().as_str(), "http://sink/path");
        assert_eq!(request.query_args()["a"], "1");
        assert_eq!(request.query_args()["b"], "2");
    }

    #[test]
    fn timeout_defaults_to_sixty_seconds() {
        let request =
            OutboundRequest::new("GET", "http://sink/", String::new(), HashMap::new(), "")
                .unwrap();
        assert_eq!(request.timeout(), DEFAULT_TIMEOUT);

        let request =
            OutboundRequest::new("GET", "http://sink/", String::new(), HashMap::new(), "250ms")
                .unwrap();
        assert_eq!(request.timeout(), Duration::from_millis(250));
    }
}
