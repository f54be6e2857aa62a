//! Recovery of a JSON object from free-form model output.
//!
//! Models wrap JSON in markdown fences or pad it with prose more often than
//! not. [`extract_json_object`] unwraps one fenced block if present, then
//! scans for the first balanced `{...}` substring, honoring string literals
//! and escapes so braces inside values do not end the scan early.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid regex")
});

/// Returns the first balanced JSON object inside `text`, or `None` when no
/// complete object exists.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let body = FENCED_BLOCK_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str());

    let start = body.find('{')?;
    let candidate = &body[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in candidate.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&candidate[..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object_is_returned_as_is() {
        assert_eq!(extract_json_object(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn fenced_json_block_is_unwrapped() {
        let text = "Here you go:\n```json\n{\"score\": 80}\n```\nHope that helps!";
        assert_eq!(extract_json_object(text), Some("{\"score\": 80}"));
    }

    #[test]
    fn fence_without_language_tag_is_unwrapped() {
        let text = "```\n{\"ok\": true}\n```";
        assert_eq!(extract_json_object(text), Some("{\"ok\": true}"));
    }

    #[test]
    fn leading_prose_is_skipped() {
        let text = "The assessment is as follows: {\"score\": 55} — done.";
        assert_eq!(extract_json_object(text), Some("{\"score\": 55}"));
    }

    #[test]
    fn nested_objects_stay_balanced() {
        let text = r#"{"outer": {"inner": {"deep": 1}}} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"outer": {"inner": {"deep": 1}}}"#)
        );
    }

    #[test]
    fn braces_inside_string_values_do_not_close_the_object() {
        let text = r#"{"note": "use {placeholders} like {this}", "n": 2}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn escaped_quotes_inside_strings_are_honored() {
        let text = r#"{"quote": "she said \"run {it}\"", "ok": true}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn unterminated_object_yields_none() {
        assert_eq!(extract_json_object(r#"{"a": {"b": 1}"#), None);
        assert_eq!(extract_json_object("no json here"), None);
    }
}
