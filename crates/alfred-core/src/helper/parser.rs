//! Discovery and sanitisation of helper expressions in raw mock bytes.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::{date, random, Helper, HelperKind, PARAM_NAME, PARAM_REGEX};
use crate::{Error, Result};

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{ ?([^{}]*?\)?) ?\}\}").expect("token regex"));

static TARGET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"alfred\.(\w+)\.([^@]*)").expect("target regex"));

static PARAMS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(\w*):'([^']*)'").expect("params regex"));

/// Find every `{{ … }}` expression in the buffer and build a sanitised
/// helper per distinct expression body. The first sanitisation failure
/// aborts the build; helper errors are load-time fatal.
pub fn build_helpers(buffer: &[u8]) -> Result<Vec<Helper>> {
    let text = String::from_utf8_lossy(buffer);

    let mut helpers = Vec::new();
    for (token, body) in find_helper_strings(&text) {
        helpers.push(create_helper(&token, &body)?);
    }
    Ok(helpers)
}

/// Non-overlapping `{{ … }}` matches, deduplicated by inner body.
fn find_helper_strings(text: &str) -> Vec<(String, String)> {
    let mut found: Vec<(String, String)> = Vec::new();
    for caps in TOKEN_RE.captures_iter(text) {
        let body = caps[1].to_string();
        if found.iter().any(|(_, seen)| *seen == body) {
            continue;
        }
        found.push((caps[0].to_string(), body));
    }
    found
}

fn create_helper(token: &str, body: &str) -> Result<Helper> {
    let caps = TARGET_RE.captures(body).ok_or_else(|| {
        Error::invalid_helper_syntax(format!(
            "'{token}' is not an alfred.<kind>.<target> expression"
        ))
    })?;

    let kind_segment = caps.get(1).map_or("", |m| m.as_str());
    let kind = HelperKind::from_segment(kind_segment).ok_or(Error::UnknownHelperKind {
        kind: kind_segment.to_string(),
    })?;

    let params = helper_string_params(body);

    let mut helper = Helper {
        kind,
        string: token.to_string(),
        target: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
        ..Helper::default()
    };
    if let Some(name) = params.get(PARAM_NAME) {
        helper.name = name.clone();
    }
    if let Some(pattern) = params.get(PARAM_REGEX) {
        helper.regex = Some(Regex::new(pattern)?);
    }

    sanitize_helper(helper)
}

/// Trailing `@name:'value'` parameters; unknown parameter names are dropped.
fn helper_string_params(body: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for caps in PARAMS_RE.captures_iter(body) {
        let key = &caps[1];
        if key == PARAM_NAME || key == PARAM_REGEX {
            params.insert(key.to_string(), caps[2].to_string());
        }
    }
    params
}

fn sanitize_helper(helper: Helper) -> Result<Helper> {
    match helper.kind {
        HelperKind::Request => Ok(helper),
        HelperKind::PathRegex => sanitize_path_helper(helper),
        HelperKind::Date => date::sanitize_date_helper(helper),
        HelperKind::Random => random::sanitize_random_helper(helper),
    }
}

/// A path helper's target names a capture-group index into the mock's
/// compiled path regex.
fn sanitize_path_helper(helper: Helper) -> Result<Helper> {
    helper.target.parse::<usize>().map_err(|_| {
        Error::invalid_helper_syntax(format!(
            "path helper target '{}' is not a capture group index",
            helper.target
        ))
    })?;
    Ok(helper)
}
