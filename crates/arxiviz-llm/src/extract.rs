//! Pull structured payloads out of free-text model responses.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::LlmError;
use crate::Result;

static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("static regex"));

static ANY_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w+-]*\s*(.*?)\s*```").expect("static regex"));

static PYTHON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```python\s*(.*?)\s*```").expect("static regex"));

fn fenced<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// First `{...}` region whose braces balance, ignoring braces in strings.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// JSON payload of a response.
///
/// Tries a ```json fence, then any fence, then the whole text, then the
/// first balanced object.
pub fn extract_json_block(text: &str) -> Option<Value> {
    let candidates = [
        fenced(&JSON_FENCE_RE, text),
        fenced(&ANY_FENCE_RE, text),
        Some(text.trim()),
        balanced_object(text),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|c| serde_json::from_str(c).ok())
}

/// Deserialize the JSON payload of a response into `T`.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = extract_json_block(text).ok_or_else(|| LlmError::Extraction {
        what: "JSON",
        excerpt: excerpt(text),
    })?;
    Ok(serde_json::from_value(value)?)
}

/// Code of a response: ```python fence, any fence, or the raw text.
pub fn extract_code_block(text: &str) -> String {
    fenced(&PYTHON_FENCE_RE, text)
        .or_else(|| fenced(&ANY_FENCE_RE, text))
        .unwrap_or_else(|| text.trim())
        .to_string()
}

fn excerpt(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_fence_preferred() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\n```\n{\"a\": 2}\n```";
        assert_eq!(extract_json_block(text).unwrap()["a"], 1);
    }

    #[test]
    fn test_bare_json() {
        assert_eq!(extract_json_block("  {\"a\": [1, 2]}  ").unwrap()["a"][1], 2);
    }

    #[test]
    fn test_balanced_region_with_braces_in_strings() {
        let text = r#"Sure! {"formula": "\\frac{a}{b}", "nested": {"ok": true}} Hope it helps."#;
        let value = extract_json_block(text).unwrap();
        assert_eq!(value["nested"]["ok"], true);
        assert_eq!(value["formula"], "\\frac{a}{b}");
    }

    #[test]
    fn test_no_json_is_extraction_error() {
        let err = parse_json::<Value>("I cannot do that.").unwrap_err();
        assert!(matches!(err, LlmError::Extraction { what: "JSON", .. }));
    }

    #[test]
    fn test_code_block_variants() {
        assert_eq!(
            extract_code_block("text\n```python\nprint(1)\n```\n"),
            "print(1)"
        );
        assert_eq!(extract_code_block("```py\nprint(2)\n```"), "print(2)");
        assert_eq!(extract_code_block("\n print(3) \n"), "print(3)");
    }
}
