//! Best-effort recovery of a JSON object from free-form model text.
//!
//! Models wrap JSON in fences, prepend chatter, or trail off with commentary.
//! Recovery is: strip fence markers, take the first balanced `{...}` span,
//! parse it. Anything that still fails is `None`; callers own the fallback.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*").expect("fence pattern is valid"));

/// Removes every ``` / ```json marker, keeping the content between them.
pub fn strip_json_fences(text: &str) -> String {
    FENCE_RE.replace_all(text, "").trim().to_string()
}

/// Returns the first balanced `{...}` span, honouring string literals and escapes.
/// Falls back to the widest `{...}` span when braces never balance.
pub fn extract_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parses the first JSON object found in `text` into `T`.
pub fn parse_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    let cleaned = strip_json_fences(text);
    let span = extract_object_span(&cleaned)?;
    serde_json::from_str(span).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        text: String,
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), input);
    }

    #[test]
    fn test_extract_first_object_ignores_trailing_text() {
        let input = r#"Here you go: {"text": "a"} and also {"text": "b"}"#;
        assert_eq!(extract_object_span(input), Some(r#"{"text": "a"}"#));
    }

    #[test]
    fn test_extract_handles_braces_inside_strings() {
        let input = r#"{"text": "use a map like {k: v} here \"quoted }\""} trailing"#;
        let span = extract_object_span(input).unwrap();
        let reply: Reply = serde_json::from_str(span).unwrap();
        assert_eq!(reply.text, "use a map like {k: v} here \"quoted }\"");
    }

    #[test]
    fn test_extract_nested_object() {
        let input = r#"noise {"ratings": {"technical": 7}, "summary": "ok"} noise"#;
        assert_eq!(
            extract_object_span(input),
            Some(r#"{"ratings": {"technical": 7}, "summary": "ok"}"#)
        );
    }

    #[test]
    fn test_extract_without_braces_is_none() {
        assert_eq!(extract_object_span("I cannot help with that."), None);
    }

    #[test]
    fn test_parse_object_from_fenced_chatter() {
        let input = "Sure!\n```json\n{\"text\": \"Tell me about Rust\"}\n```\nHope that helps.";
        let reply: Option<Reply> = parse_object(input);
        assert_eq!(
            reply,
            Some(Reply {
                text: "Tell me about Rust".to_string()
            })
        );
    }

    #[test]
    fn test_parse_object_truncated_output_is_none() {
        let reply: Option<Reply> = parse_object(r#"{"text": "cut off mid"#);
        assert_eq!(reply, None);
    }
}
