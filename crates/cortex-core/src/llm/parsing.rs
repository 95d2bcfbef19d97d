//! Pulling JSON out of free-form model replies
//!
//! Models wrap JSON in code fences, prefix it with prose, or (qwen3 and other
//! reasoning models) emit a `<think>` block first. Replies get one cleanup
//! and one parse attempt; anything else is a malformed response.

use serde_json::Value;

use crate::error::{Error, Result};

/// Remove `<think>...</think>` sections
fn strip_reasoning(response: &str) -> String {
    let mut out = String::with_capacity(response.len());
    let mut rest = response;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Extract the JSON payload from a model reply
pub fn extract_json_from_response(response: &str) -> String {
    let response = strip_reasoning(response);

    // Code blocks tagged as JSON first
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim().to_string();
        }
    }

    // Then any code block
    if let Some(start) = response.find("```") {
        let potential_start = start + 3;
        if let Some(newline) = response[potential_start..].find('\n') {
            let json_start = potential_start + newline + 1;
            if let Some(end) = response[json_start..].find("```") {
                return response[json_start..json_start + end].trim().to_string();
            }
        }
    }

    // Raw JSON: whichever bracket opens first, up to its last closer
    let array = response.find('[').zip(response.rfind(']'));
    let object = response.find('{').zip(response.rfind('}'));
    let span = match (array, object) {
        (Some(a), Some(o)) => Some(if a.0 < o.0 { a } else { o }),
        (a, o) => a.or(o),
    };
    if let Some((start, end)) = span {
        if start < end {
            return response[start..=end].to_string();
        }
    }

    response.trim().to_string()
}

/// Parse a reply that should contain a JSON list
///
/// A top-level object holding exactly one array (`{"facts": [...]}`) is
/// accepted as that array. Individual items are returned untyped so callers
/// can skip bad ones without losing the rest.
pub fn parse_json_list(response: &str) -> Result<Vec<Value>> {
    let payload = extract_json_from_response(response);
    let value: Value = serde_json::from_str(&payload)
        .map_err(|e| Error::MalformedResponse(format!("{}: {}", e, truncate(&payload, 200))))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            let mut arrays = map.into_iter().filter_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            });
            match (arrays.next(), arrays.next()) {
                (Some(items), None) => Ok(items),
                _ => Err(Error::MalformedResponse(
                    "expected a JSON list, got an object".to_string(),
                )),
            }
        }
        other => Err(Error::MalformedResponse(format!(
            "expected a JSON list, got {}",
            other
        ))),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_json_fence() {
        let reply = "Here you go:\n```json\n[{\"keep\": \"A\", \"merge\": \"a\"}]\n```\nDone.";
        assert_eq!(
            extract_json_from_response(reply),
            "[{\"keep\": \"A\", \"merge\": \"a\"}]"
        );
    }

    #[test]
    fn test_extract_from_plain_fence() {
        let reply = "```\n[]\n```";
        assert_eq!(extract_json_from_response(reply), "[]");
    }

    #[test]
    fn test_extract_raw_array_with_prose() {
        let reply = "Sure! [{\"head\": \"A\"}] hope that helps";
        assert_eq!(extract_json_from_response(reply), "[{\"head\": \"A\"}]");
    }

    #[test]
    fn test_extract_prefers_outer_array() {
        let reply = "[{\"a\": 1}, {\"b\": 2}]";
        assert_eq!(extract_json_from_response(reply), reply);
    }

    #[test]
    fn test_extract_strips_reasoning() {
        let reply = "<think>maybe [this] or {that}</think>\n[{\"head\": \"A\"}]";
        assert_eq!(extract_json_from_response(reply), "[{\"head\": \"A\"}]");
    }

    #[test]
    fn test_parse_json_list() {
        let items = parse_json_list("```json\n[{\"head\": \"A\"}, {\"head\": \"B\"}]\n```").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["head"], "B");
    }

    #[test]
    fn test_parse_wrapped_list() {
        let items = parse_json_list(r#"{"facts": [{"head": "A"}]}"#).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_json_list("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        let err = parse_json_list("I could not find any duplicates.").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        assert_eq!(err.code(), "E103");
    }

    #[test]
    fn test_parse_scalar_is_malformed() {
        assert!(matches!(
            parse_json_list("42"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
