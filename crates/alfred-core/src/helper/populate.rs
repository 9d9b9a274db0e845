//! Serve-time helper population.
//!
//! Every populate function takes cloned templates, fills the `value` of
//! helpers that do not have one yet, and returns the list. Population
//! failures are soft: the value stays empty and a warning is logged; the
//! response is still produced.

use http::header::CONTENT_TYPE;
use http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;

use super::{date, random, Helper};

/// Fill path-regex helpers from the capture mapping computed by the
/// router's regex middleware (helper token -> captured substring).
pub fn populate_path_helpers(
    captures: &HashMap<String, String>,
    mut helpers: Vec<Helper>,
) -> Vec<Helper> {
    for helper in &mut helpers {
        if helper.has_value() {
            continue;
        }
        if let Some(value) = captures.get(&helper.string) {
            if !value.is_empty() {
                helper.value = value.clone();
            }
        }
    }
    helpers
}

/// Fill request helpers from the live request. Extraction precedence,
/// first hit wins: JSON body path, XML body path, text body regex, URL
/// query parameter, URL-form parameter, request header.
pub fn populate_request_helpers(
    body: &[u8],
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    mut helpers: Vec<Helper>,
) -> Vec<Helper> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.contains("json") {
        json_watcher(body, &mut helpers);
    } else if content_type.contains("xml") {
        xml_watcher(body, &mut helpers);
    } else if content_type.contains("text") {
        text_watcher(body, &mut helpers);
    } else if !body.is_empty() {
        tracing::warn!(content_type, "content type unknown, body ignored for helpers");
    }

    query_watcher(query, &mut helpers);
    form_watcher(body, &content_type, &mut helpers);
    headers_watcher(headers, &mut helpers);

    helpers
}

/// Fill date helpers. Computation failures leave the value empty.
pub fn populate_date_helpers(mut helpers: Vec<Helper>) -> Vec<Helper> {
    for helper in &mut helpers {
        if helper.has_value() {
            continue;
        }
        match date::target_date_value(helper) {
            Ok(value) => helper.value = value,
            Err(e) => tracing::warn!(target = %helper.target, "date helper failed: {e}"),
        }
    }
    helpers
}

/// Fill random helpers by invoking their generator.
pub fn populate_random_helpers(mut helpers: Vec<Helper>) -> Vec<Helper> {
    for helper in &mut helpers {
        if helper.has_value() {
            continue;
        }
        let params = random::helper_params(helper);
        helper.value = random::random_value(&helper.target, &params);
    }
    helpers
}

fn json_watcher(body: &[u8], helpers: &mut [Helper]) {
    let parsed: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("request body is not valid JSON: {e}");
            return;
        }
    };
    json_values_into_helpers(&parsed, helpers);
}

fn xml_watcher(body: &[u8], helpers: &mut [Helper]) {
    let text = String::from_utf8_lossy(body);
    let parsed = match xml_to_json(&text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("request body is not valid XML: {e}");
            return;
        }
    };
    json_values_into_helpers(&parsed, helpers);
}

fn json_values_into_helpers(parsed: &Value, helpers: &mut [Helper]) {
    for helper in helpers {
        if helper.has_value() {
            continue;
        }
        if let Some(value) = json_lookup(parsed, &helper.target) {
            helper.value = json_value_to_string(value);
        }
    }
}

fn text_watcher(body: &[u8], helpers: &mut [Helper]) {
    for helper in helpers {
        if helper.has_value() {
            continue;
        }
        let Some(regex) = &helper.regex else { continue };
        let text = String::from_utf8_lossy(body);
        if let Some(caps) = regex.captures(&text) {
            if let Some(group) = caps.get(1) {
                helper.value = group.as_str().to_string();
            }
        }
    }
}

fn query_watcher(query: &HashMap<String, String>, helpers: &mut [Helper]) {
    if query.is_empty() {
        return;
    }
    for helper in helpers {
        if helper.has_value() {
            continue;
        }
        if let Some(value) = query.get(&helper.target) {
            helper.value = value.clone();
        }
    }
}

fn form_watcher(body: &[u8], content_type: &str, helpers: &mut [Helper]) {
    if !content_type.contains("x-www-form-urlencoded") {
        return;
    }
    let form: HashMap<String, String> = url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    for helper in helpers {
        if helper.has_value() {
            continue;
        }
        if let Some(value) = form.get(&helper.target) {
            helper.value = value.clone();
        }
    }
}

fn headers_watcher(headers: &HeaderMap, helpers: &mut [Helper]) {
    for helper in helpers {
        if helper.has_value() || helper.target.is_empty() {
            continue;
        }
        // HeaderMap lookups are case-insensitive; a multi-valued header
        // contributes its first value.
        if let Some(value) = headers.get(helper.target.as_str()) {
            if let Ok(text) = value.to_str() {
                helper.value = text.to_string();
            }
        }
    }
}

/// Navigate a JSON value by dotted path ("user.addresses.0.city").
fn json_lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn json_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Convert an XML document into a JSON value so the dotted-path lookup
/// works on both body shapes. Attributes are prefixed with `-`, text of a
/// mixed element lands under `#content`, repeated siblings become arrays.
fn xml_to_json(input: &str) -> Result<Value, roxmltree::Error> {
    let document = roxmltree::Document::parse(input)?;
    let root = document.root_element();
    let mut map = serde_json::Map::new();
    map.insert(root.tag_name().name().to_string(), element_value(root));
    Ok(Value::Object(map))
}

fn element_value(node: roxmltree::Node<'_, '_>) -> Value {
    let mut map = serde_json::Map::new();
    for attribute in node.attributes() {
        map.insert(
            format!("-{}", attribute.name()),
            Value::String(attribute.value().to_string()),
        );
    }

    let children: Vec<_> = node.children().filter(roxmltree::Node::is_element).collect();
    if children.is_empty() {
        let text = node.text().unwrap_or("").trim().to_string();
        if map.is_empty() {
            return Value::String(text);
        }
        map.insert("#content".to_string(), Value::String(text));
        return Value::Object(map);
    }

    for child in children {
        let name = child.tag_name().name().to_string();
        let value = element_value(child);
        match map.remove(&name) {
            None => {
                map.insert(name, value);
            }
            Some(Value::Array(mut items)) => {
                items.push(value);
                map.insert(name, Value::Array(items));
            }
            Some(existing) => {
                map.insert(name, Value::Array(vec![existing, value]));
            }
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::build_helpers;
    use http::header::CONTENT_TYPE;

    fn populate(
        body: &[u8],
        content_type: &str,
        query: &[(&str, &str)],
        expression: &str,
    ) -> Helper {
        let helpers = build_helpers(expression.as_bytes()).unwrap();
        let mut headers = HeaderMap::new();
        if !content_type.is_empty() {
            headers.insert(CONTENT_TYPE, content_type.parse().unwrap());
        }
        let query: HashMap<String, String> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        populate_request_helpers(body, &headers, &query, helpers).remove(0)
    }

    #[test]
    fn json_body_dotted_path() {
        let h = populate(
            br#"{"user":{"name":"Alfred","ids":[7,9]}}"#,
            "application/json",
            &[],
            "{{ alfred.req.user.name }}",
        );
        assert_eq!(h.value, "Alfred");

        let h = populate(
            br#"{"user":{"ids":[7,9]}}"#,
            "application/json",
            &[],
            "{{ alfred.req.user.ids.1 }}",
        );
        assert_eq!(h.value, "9");
    }

    #[test]
    fn xml_body_converted_to_json() {
        let h = populate(
            br#"<order id="12"><customer><name>Bruce</name></customer></order>"#,
            "application/xml",
            &[],
            "{{ alfred.req.order.customer.name }}",
        );
        assert_eq!(h.value, "Bruce");

        let h = populate(
            br#"<order id="12"><total>40</total></order>"#,
            "text/xml",
            &[],
            "{{ alfred.req.order.-id }}",
        );
        assert_eq!(h.value, "12");
    }

    #[test]
    fn text_body_uses_the_helper_regex() {
        let h = populate(
            b"session=abc123;ttl=60",
            "text/plain",
            &[],
            "{{ alfred.req.session @regex:'session=(\\w+)' }}",
        );
        assert_eq!(h.value, "abc123");
    }

    #[test]
    fn query_param_and_header_fallbacks() {
        let h = populate(b"", "", &[("token", "q-token")], "{{ alfred.req.token }}");
        assert_eq!(h.value, "q-token");

        let helpers = build_helpers(b"{{ alfred.req.x-request-id }}").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-Id", "abc".parse().unwrap());
        let populated =
            populate_request_helpers(b"", &headers, &HashMap::new(), helpers).remove(0);
        assert_eq!(populated.value, "abc");
    }

    #[test]
    fn form_body_parameters() {
        let h = populate(
            b"who=Robin&age=13",
            "application/x-www-form-urlencoded",
            &[],
            "{{ alfred.req.who }}",
        );
        assert_eq!(h.value, "Robin");
    }

    #[test]
    fn body_wins_over_query_and_header() {
        let h = populate(
            br#"{"token":"body-token"}"#,
            "application/json",
            &[("token", "q-token")],
            "{{ alfred.req.token }}",
        );
        assert_eq!(h.value, "body-token");
    }

    #[test]
    fn populated_helper_is_skipped() {
        let mut helpers = build_helpers(b"{{ alfred.req.name }}").unwrap();
        helpers[0].value = "already".to_string();
        let populated = populate_request_helpers(
            br#"{"name":"other"}"#,
            &HeaderMap::new(),
            &HashMap::new(),
            helpers,
        );
        assert_eq!(populated[0].value, "already");
    }

    #[test]
    fn path_captures_are_matched_by_token() {
        let helpers = build_helpers(b"u={{ alfred.path.1 }};o={{ alfred.path.2 }}").unwrap();
        let captures = HashMap::from([
            ("{{ alfred.path.1 }}".to_string(), "42".to_string()),
            ("{{ alfred.path.2 }}".to_string(), "7".to_string()),
        ]);
        let populated = populate_path_helpers(&captures, helpers);
        assert_eq!(populated[0].value, "42");
        assert_eq!(populated[1].value, "7");
    }

    #[test]
    fn date_and_random_population() {
        let helpers = build_helpers(b"{{ alfred.time.now.format('unix') }}").unwrap();
        let populated = populate_date_helpers(helpers);
        assert!(populated[0].has_value());

        let helpers = build_helpers(b"{{ alfred.random.RandomIntBetween(5,6) }}").unwrap();
        let populated = populate_random_helpers(helpers);
        assert_eq!(populated[0].value, "5");
    }
}
