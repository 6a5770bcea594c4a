//! Pure payload embedding for server-rendered documents.
//!
//! The serialized payload is placed in a `<script type="application/json">`
//! element next to the markup. Nothing here executes as code on the client:
//! the block is data, read back by id before any component mounts.

use crate::config::PayloadConfig;
use crate::error::{Result, SsrCoreError};
use crate::payload::PayloadStore;

/// Escapes serialized JSON so it cannot break out of a `<script>` element.
///
/// `<`, `>` and `&` can only occur inside JSON strings, so replacing them with
/// `\uXXXX` escapes keeps the text valid JSON that parses to the same values,
/// while making `</script>` and `<!--` impossible to spell. U+2028 and U+2029
/// are escaped as well because older script parsers treat them as line
/// terminators.
pub fn escape_for_script(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Serializes `store` and wraps it in the payload script element.
///
/// Fails when the serialized payload exceeds `config.max_payload_bytes`.
pub fn embed(store: &PayloadStore, config: &PayloadConfig) -> Result<String> {
    let block = store.serialize()?;

    if block.len() > config.max_payload_bytes {
        return Err(SsrCoreError::PayloadTooLarge {
            size: block.len(),
            max: config.max_payload_bytes,
        });
    }

    Ok(script_tag(&config.element_id, &block))
}

/// Wraps an already-escaped block in the payload script element.
pub fn script_tag(element_id: &str, block: &str) -> String {
    format!(r#"<script id="{element_id}" type="application/json">{block}</script>"#)
}

/// Finds the payload block for `element_id` in a rendered document.
///
/// Returns the raw text between the opening tag and `</script>`, or `None`
/// when the element is absent or unterminated.
pub fn extract_block<'a>(document: &'a str, element_id: &str) -> Option<&'a str> {
    let marker = format!(r#"id="{element_id}""#);
    let mut search_from = 0;

    while let Some(offset) = document[search_from..].find(&marker) {
        let attr_at = search_from + offset;
        search_from = attr_at + marker.len();

        // The id must belong to an open <script ...> tag
        let Some(tag_at) = document[..attr_at].rfind("<script") else {
            continue;
        };
        if document[tag_at..attr_at].contains('>') {
            continue;
        }

        let body_at = attr_at + document[attr_at..].find('>')? + 1;
        let body_len = document[body_at..].find("</script>")?;
        return Some(&document[body_at..body_at + body_len]);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ComponentId;
    use crate::state::State;

    fn config() -> PayloadConfig {
        PayloadConfig::default()
    }

    #[test]
    fn test_escape_leaves_plain_json_untouched() {
        let json = r#"{".0":{"a":1,"b":"text"}}"#;
        assert_eq!(escape_for_script(json), json);
    }

    #[test]
    fn test_escape_prevents_script_breakout() {
        let json = r#"{"x":"</script><script>alert('xss')</script>"}"#;
        let escaped = escape_for_script(json);
        assert!(!escaped.contains("</script"));
        assert!(!escaped.contains('<'));
        assert!(escaped.contains("\\u003c/script\\u003e"));
    }

    #[test]
    fn test_escape_prevents_comment_open() {
        let escaped = escape_for_script(r#"{"x":"<!-- hidden"}"#);
        assert!(!escaped.contains("<!--"));
    }

    #[test]
    fn test_escaped_json_parses_to_same_value() {
        let value = serde_json::json!({
            "html": "<b>bold</b> & </script>",
            "sep": "line\u{2028}para\u{2029}end",
        });
        let json = serde_json::to_string(&value).unwrap();
        let escaped = escape_for_script(&json);

        let parsed: serde_json::Value = serde_json::from_str(&escaped).unwrap();
        assert_eq!(parsed, value);
        assert!(!escaped.contains('\u{2028}'));
    }

    #[test]
    fn test_embed_wraps_payload_in_script() {
        let mut store = PayloadStore::open();
        store.set(ComponentId::root(), State::new().with("a", 1));

        let tag = embed(&store, &config()).unwrap();
        assert_eq!(
            tag,
            r#"<script id="__STATE_PAYLOAD__" type="application/json">{".0":{"a":1}}</script>"#
        );
    }

    #[test]
    fn test_embed_rejects_oversized_payload() {
        let mut store = PayloadStore::open();
        store.set(ComponentId::root(), State::new().with("blob", "x".repeat(64)));
        let config = PayloadConfig::new("__STATE_PAYLOAD__", 16).unwrap();

        let result = embed(&store, &config);
        assert!(matches!(result, Err(SsrCoreError::PayloadTooLarge { max: 16, .. })));
    }

    #[test]
    fn test_extract_block_from_document() {
        let mut store = PayloadStore::open();
        store.set(
            ComponentId::root().child(1),
            State::new().with("msg", "</script>"),
        );
        let document = format!(
            "<div>markup</div>{}<script src=\"/client.js\"></script>",
            embed(&store, &config()).unwrap()
        );

        let block = extract_block(&document, "__STATE_PAYLOAD__").unwrap();
        assert_eq!(PayloadStore::deserialize(Some(block)), store);
    }

    #[test]
    fn test_extract_block_ignores_non_script_elements() {
        let document = concat!(
            r#"<div id="__STATE_PAYLOAD__">not it</div>"#,
            r#"<script id="__STATE_PAYLOAD__" type="application/json">{}</script>"#
        );
        assert_eq!(extract_block(document, "__STATE_PAYLOAD__"), Some("{}"));
    }

    #[test]
    fn test_extract_block_missing() {
        assert_eq!(extract_block("<div>no payload</div>", "__STATE_PAYLOAD__"), None);
        assert_eq!(
            extract_block(
                r#"<script id="__STATE_PAYLOAD__" type="application/json">{"#,
                "__STATE_PAYLOAD__"
            ),
            None
        );
    }
}
