//! The request/response records handed to user scripts.
//!
//! Field names are the script-facing contract: `alfred(mock, helpers,
//! req, res)` sees exactly these shapes.

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Flattened view of the incoming request: headers and query values are
/// comma-joined when multi-valued.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Req {
    pub method: String,
    pub url: String,
    pub body: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
}

impl Req {
    pub fn new(method: String, url: String, body: String) -> Self {
        Self {
            method,
            url,
            body,
            ..Self::default()
        }
    }

    pub fn set_headers(&mut self, headers: &HeaderMap) {
        self.headers = flatten_headers(headers);
    }

    pub fn set_query(&mut self, pairs: impl Iterator<Item = (String, String)>) {
        let mut query: HashMap<String, String> = HashMap::new();
        for (key, value) in pairs {
            query
                .entry(key)
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        self.query = query;
    }
}

/// The response under construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Res {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl Res {
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    /// JSON form used for debug logging.
    pub fn stringify(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut flat = HashMap::new();
    for key in headers.keys() {
        let joined = headers
            .get_all(key)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        flat.insert(key.to_string(), joined);
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_comma_joined() {
        let mut headers = HeaderMap::new();
        headers.append("accept", "text/plain".parse().unwrap());
        headers.append("accept", "application/json".parse().unwrap());
        let flat = flatten_headers(&headers);
        assert_eq!(flat["accept"], "text/plain,application/json");
    }

    #[test]
    fn query_values_are_comma_joined() {
        let mut req = Req::default();
        req.set_query(
            vec![
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
                ("id".to_string(), "1".to_string()),
            ]
            .into_iter(),
        );
        assert_eq!(req.query["tag"], "a,b");
        assert_eq!(req.query["id"], "1");
    }

    #[test]
    fn res_serializes_with_script_facing_names() {
        let mut res = Res {
            status: 200,
            body: "ok".to_string(),
            ..Res::default()
        };
        res.set_header("content-type", "text/plain");
        let json: serde_json::Value = serde_json::from_str(&res.stringify()).unwrap();
        assert_eq!(json["status"], 200);
        assert_eq!(json["body"], "ok");
        assert_eq!(json["headers"]["content-type"], "text/plain");
    }
}
