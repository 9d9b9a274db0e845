//! Templated helper expressions.
//!
//! A helper is one `{{ alfred.<kind>.<target> … }}` occurrence found in a
//! mock file. Helpers are sanitised once at load time and live on the mock
//! as read-only templates; serve-time population always works on clones so
//! concurrent requests never observe each other's values.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod date;
pub mod parser;
pub mod populate;
pub mod random;

pub use parser::build_helpers;

/// `@name:'…'` parameter label.
pub const PARAM_NAME: &str = "name";
/// `@regex:'…'` parameter label.
pub const PARAM_REGEX: &str = "regex";

/// Helper kinds, by the segment following the `alfred.` prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HelperKind {
    #[default]
    #[serde(rename = "req")]
    Request,
    #[serde(rename = "path")]
    PathRegex,
    #[serde(rename = "time")]
    Date,
    #[serde(rename = "random")]
    Random,
}

impl HelperKind {
    /// Map an expression segment (`req`, `path`, `time`, `random`) to a kind.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "req" => Some(Self::Request),
            "path" => Some(Self::PathRegex),
            "time" => Some(Self::Date),
            "random" => Some(Self::Random),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "req",
            Self::PathRegex => "path",
            Self::Date => "time",
            Self::Random => "random",
        }
    }
}

/// One templated expression. The serialized field names (`type`, `str`,
/// `value`, `target`, `name`) are the interop contract with user scripts;
/// `regex` and the private parameters stay host-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Helper {
    #[serde(rename = "type")]
    pub kind: HelperKind,
    /// Original token, braces included.
    #[serde(rename = "str")]
    pub string: String,
    /// Populated per request; empty until then.
    pub value: String,
    /// Expression body between `alfred.<kind>.` and the first `@`, trimmed.
    pub target: String,
    /// Optional `@name:'…'` label.
    pub name: String,
    /// Optional compiled `@regex:'…'` pattern for text-body extraction.
    #[serde(skip)]
    pub regex: Option<Regex>,
    #[serde(skip)]
    pub(crate) private_params: HashMap<String, String>,
}

impl Helper {
    pub fn has_value(&self) -> bool {
        !self.value.is_empty()
    }

    pub fn add_private_param(
        &mut self,
        param_name: impl Into<String>,
        param_value: impl Into<String>,
    ) {
        self.private_params
            .insert(param_name.into(), param_value.into());
    }

    /// Sanitisation metadata for this helper; empty string when absent.
    pub fn private_param(&self, param_name: &str) -> &str {
        self.private_params
            .get(param_name)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn private_params(&self) -> &HashMap<String, String> {
        &self.private_params
    }

    /// JSON form used for debug logging.
    pub fn json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Replace every occurrence of each helper's token by its populated value.
///
/// Tokens are distinct (deduplicated at parse time), so the replacement
/// order does not matter; the same token used several times receives the
/// same value.
pub fn replace_helpers(input: &str, helpers: &[Helper]) -> String {
    let mut out = input.to_string();
    for helper in helpers {
        if !helper.string.is_empty() {
            out = out.replace(&helper.string, &helper.value);
        }
    }
    out
}

/// JSON form of a helper list, for debug logging.
pub fn helpers_json_string(helpers: &[Helper]) -> String {
    helpers.iter().map(Helper::json_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper(token: &str, value: &str) -> Helper {
        Helper {
            kind: HelperKind::Request,
            string: token.to_string(),
            value: value.to_string(),
            ..Helper::default()
        }
    }

    #[test]
    fn replaces_every_occurrence_with_the_same_value() {
        let h = helper("{{ alfred.req.id }}", "42");
        let body = "{{ alfred.req.id }}-{{ alfred.req.id }}-{{ alfred.req.id }}";
        assert_eq!(replace_helpers(body, &[h]), "42-42-42");
    }

    #[test]
    fn empty_value_erases_the_token() {
        let h = helper("{{ alfred.req.missing }}", "");
        assert_eq!(replace_helpers("a{{ alfred.req.missing }}b", &[h]), "ab");
    }

    #[test]
    fn clone_preserves_private_params_and_regex() {
        let mut h = helper("{{ alfred.req.x @regex:'v=(\\d+)' }}", "");
        h.regex = Some(Regex::new(r"v=(\d+)").unwrap());
        h.add_private_param("param-0", "1");

        let clone = h.clone();
        assert_eq!(clone.private_params(), h.private_params());
        assert_eq!(
            clone.regex.as_ref().map(Regex::as_str),
            h.regex.as_ref().map(Regex::as_str)
        );
    }

    #[test]
    fn script_facing_serialization_uses_tag_names() {
        let mut h = helper("{{ alfred.req.who }}", "Alfred");
        h.target = "who".to_string();
        h.name = "who-label".to_string();
        h.add_private_param("hidden", "yes");

        let json: serde_json::Value = serde_json::from_str(&h.json_string()).unwrap();
        assert_eq!(json["str"], "{{ alfred.req.who }}");
        assert_eq!(json["value"], "Alfred");
        assert_eq!(json["type"], "req");
        assert_eq!(json["target"], "who");
        assert_eq!(json["name"], "who-label");
        assert!(json.get("hidden").is_none());
    }
}
