//! Mock model: one matcher + response + actions + helpers bundle.

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::helper::{Helper, HelperKind};

mod builder;
mod loader;
mod patch;

pub use builder::build_mock_from_json;
pub use loader::create_mock_collection_from_folder;
pub use patch::patch_mock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockRequest {
    pub method: String,
    pub url: String,
    #[serde(rename = "urlRegex", skip_serializing_if = "String::is_empty")]
    pub url_regex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockResponse {
    pub status: u16,
    #[serde(deserialize_with = "string_or_json")]
    pub body: String,
    #[serde(rename = "body-file", skip_serializing_if = "Option::is_none")]
    pub body_file: Option<String>,
    pub headers: HashMap<String, String>,
    #[serde(rename = "minResponseTime")]
    pub min_response_time: u64,
    #[serde(rename = "maxResponseTime")]
    pub max_response_time: u64,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            body_file: None,
            headers: HashMap::new(),
            min_response_time: 0,
            max_response_time: 0,
        }
    }
}

/// An asynchronous outbound side-effect triggered after a mock is served.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub method: String,
    pub url: String,
    pub body: String,
    pub headers: HashMap<String, String>,
    /// Go-style duration string, e.g. "30s". Empty means the default.
    pub timeout: String,
    #[serde(rename = "minScheduledTime")]
    pub min_scheduled_time: u64,
    #[serde(rename = "maxScheduledTime")]
    pub max_scheduled_time: u64,
}

impl MockAction {
    /// Delay before the action fires: uniform in [min, max) ms when
    /// max > min, exactly min ms otherwise.
    pub fn delay(&self) -> Duration {
        delay_between(self.min_scheduled_time, self.max_scheduled_time)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Mock {
    pub name: String,
    pub request: MockRequest,
    pub response: MockResponse,
    #[serde(rename = "function-file", skip_serializing_if = "Option::is_none")]
    pub function_file: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<MockAction>,

    #[serde(skip)]
    json_bytes: Vec<u8>,
    #[serde(skip)]
    compiled_regex: Option<Regex>,
    #[serde(skip)]
    path_helpers: Vec<Helper>,
    #[serde(skip)]
    request_helpers: Vec<Helper>,
    #[serde(skip)]
    date_helpers: Vec<Helper>,
    #[serde(skip)]
    random_helpers: Vec<Helper>,
}

impl Mock {
    pub fn name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        format!("{}-{}", self.method(), self.request.url)
    }

    pub fn method(&self) -> String {
        if !self.request.method.is_empty() {
            return self.request.method.to_uppercase();
        }
        "GET".to_string()
    }

    /// When both a literal url and a regex are set, the regex wins.
    pub fn has_url_regex(&self) -> bool {
        !self.request.url_regex.is_empty()
    }

    pub fn compiled_regex(&self) -> Option<&Regex> {
        self.compiled_regex.as_ref()
    }

    /// Response delay: uniform in [min, max) ms when max > min, exactly
    /// min ms otherwise.
    pub fn delay(&self) -> Duration {
        delay_between(
            self.response.min_response_time,
            self.response.max_response_time,
        )
    }

    pub(crate) fn add_helper(&mut self, helper: Helper) {
        match helper.kind {
            HelperKind::PathRegex => self.path_helpers.push(helper),
            HelperKind::Request => self.request_helpers.push(helper),
            HelperKind::Date => self.date_helpers.push(helper),
            HelperKind::Random => self.random_helpers.push(helper),
        }
    }

    pub fn has_helpers(&self) -> bool {
        self.has_path_helpers()
            || self.has_request_helpers()
            || self.has_date_helpers()
            || self.has_random_helpers()
    }

    pub fn has_path_helpers(&self) -> bool {
        !self.path_helpers.is_empty()
    }

    pub fn has_request_helpers(&self) -> bool {
        !self.request_helpers.is_empty()
    }

    pub fn has_date_helpers(&self) -> bool {
        !self.date_helpers.is_empty()
    }

    pub fn has_random_helpers(&self) -> bool {
        !self.random_helpers.is_empty()
    }

    /// Helper templates are read-only; consumers always get clones so
    /// per-request population never mutates what the mock owns.
    pub fn path_helpers(&self) -> Vec<Helper> {
        self.path_helpers.clone()
    }

    pub fn request_helpers(&self) -> Vec<Helper> {
        self.request_helpers.clone()
    }

    pub fn date_helpers(&self) -> Vec<Helper> {
        self.date_helpers.clone()
    }

    pub fn random_helpers(&self) -> Vec<Helper> {
        self.random_helpers.clone()
    }

    /// Compacted form of the original mock JSON, for logging and for the
    /// mock-patch round-trip.
    pub fn json_bytes(&self) -> &[u8] {
        &self.json_bytes
    }

    pub(crate) fn set_json_bytes(&mut self, bytes: Vec<u8>) {
        self.json_bytes = bytes;
    }

    pub(crate) fn set_compiled_regex(&mut self, regex: Regex) {
        self.compiled_regex = Some(regex);
    }
}

fn delay_between(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::rng().random_range(min_ms..max_ms))
}

/// `response.body` accepts either a plain string or any JSON value, which
/// is compacted into its serialized form.
fn string_or_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// The startup mock set. Mocks live for the process lifetime and are only
/// mutated by the patch endpoint; each one sits behind its own lock so a
/// patch swaps fields without readers ever observing a torn helper list.
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    mocks: Arc<Vec<Arc<parking_lot::RwLock<Mock>>>>,
}

impl MockRegistry {
    pub fn new(mocks: Vec<Mock>) -> Self {
        Self {
            mocks: Arc::new(
                mocks
                    .into_iter()
                    .map(|m| Arc::new(parking_lot::RwLock::new(m)))
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.mocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mocks.is_empty()
    }

    /// Mocks in load order (lexicographic file order), which is also the
    /// regex tie-breaking order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<parking_lot::RwLock<Mock>>> {
        self.mocks.iter()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<parking_lot::RwLock<Mock>>> {
        self.mocks
            .iter()
            .find(|mock| mock.read().name() == name)
            .cloned()
    }

    pub fn has_regex_mocks(&self) -> bool {
        self.mocks.iter().any(|mock| mock.read().has_url_regex())
    }

    /// Name/method/url records, used by the listing endpoint and by the
    /// patch endpoint's "mock not found" answer.
    pub fn info_list(&self) -> serde_json::Value {
        let list: Vec<serde_json::Value> = self
            .mocks
            .iter()
            .map(|mock| {
                let mock = mock.read();
                serde_json::json!({
                    "name": mock.name(),
                    "method": mock.method(),
                    "url": if mock.has_url_regex() {
                        mock.request.url_regex.clone()
                    } else {
                        mock.request.url.clone()
                    },
                })
            })
            .collect();
        serde_json::Value::Array(list)
    }
}
