//! JSON Extraction and Repair
//!
//! Backends are asked for strict JSON but routinely wrap it in prose or
//! markdown fences, or truncate it. The extractor:
//! - strips ```json fences and a leading BOM
//! - takes the first balanced top-level object (string/escape aware)
//! - falls back to light repair (trailing commas, unclosed strings/brackets)

use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{LessonError, Result};

/// Extract the first JSON object from backend text
///
/// Primary entry point for the outline and quiz stages. A reply that parses
/// as an array or scalar is still searched for an embedded object.
pub fn extract_json_object(content: &str) -> Result<Value> {
    let (value, _) = JsonRepairer::new().parse_or_repair(content)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(LessonError::LlmApi(format!(
            "Expected a JSON object, found {}",
            json_kind(&value)
        )))
    }
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fences(s: &str) -> String {
    let mut result = s.trim();

    if result.starts_with("```") {
        result = match result.find('\n') {
            Some(first_newline) => &result[first_newline + 1..],
            None => result.trim_start_matches('`'),
        };
    }

    if let Some(stripped) = result.trim_end().strip_suffix("```") {
        result = stripped;
    }

    result.trim().to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// JsonRepairer
// =============================================================================

/// JSON repair strategies
pub struct JsonRepairer {
    max_repair_attempts: usize,
}

impl Default for JsonRepairer {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonRepairer {
    pub fn new() -> Self {
        Self {
            max_repair_attempts: 2,
        }
    }

    /// Parse a JSON object, attempting extraction and repair if the direct
    /// parse fails or yields something other than an object
    ///
    /// Returns (Value, was_repaired)
    pub fn parse_or_repair(&self, raw: &str) -> Result<(Value, bool)> {
        let cleaned = strip_code_fences(raw.trim_start_matches('\u{feff}'));

        if let Ok(value) = serde_json::from_str::<Value>(&cleaned)
            && value.is_object()
        {
            return Ok((value, false));
        }

        let candidate = match find_first_object(&cleaned) {
            Some(object) => {
                if let Ok(value) = serde_json::from_str::<Value>(object) {
                    debug!("JSON object extracted from surrounding text");
                    return Ok((value, false));
                }
                object.to_string()
            }
            // No balanced object; maybe truncated, so repair from the first brace
            None => match cleaned.find('{') {
                Some(start) => cleaned[start..].to_string(),
                None => {
                    return Err(LessonError::LlmApi(format!(
                        "No JSON object found in response. Content preview: {}...",
                        preview(&cleaned)
                    )));
                }
            },
        };

        debug!("JSON parse failed, attempting repair");

        for attempt in 1..=self.max_repair_attempts {
            let repaired = self.repair_attempt(&candidate, attempt);

            if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
                warn!("JSON repaired on attempt {}", attempt);
                return Ok((value, true));
            }
        }

        Err(LessonError::LlmApi(format!(
            "Failed to parse or repair JSON after {} attempts. Content preview: {}...",
            self.max_repair_attempts,
            preview(&cleaned)
        )))
    }

    /// Attempt repair with increasing aggressiveness
    fn repair_attempt(&self, s: &str, level: usize) -> String {
        match level {
            1 => balance_brackets(&fix_trailing_commas(s)),
            _ => {
                let s = remove_control_chars(s);
                let s = fix_truncated_strings(&fix_trailing_commas(&s));
                balance_brackets(&s)
            }
        }
    }
}

fn preview(s: &str) -> String {
    s.chars().take(200).collect()
}

/// Byte range of the first balanced `{...}` in `s`, ignoring braces in strings
fn find_first_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in s[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Drop commas directly before `]` or `}` (outside strings)
fn fix_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
            result.push(ch);
            continue;
        }

        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }

        result.push(ch);
    }

    result
}

/// Close an unterminated string and append missing closers in nesting order
fn balance_brackets(s: &str) -> String {
    let mut result = s.to_string();
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                stack.pop();
            }
            _ => {}
        }
    }

    if in_string {
        result.push('"');
    }

    while let Some(closer) = stack.pop() {
        result.push(closer);
    }

    result
}

/// Close strings that run into a raw newline
fn fix_truncated_strings(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 10);
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
            result.push(ch);
            continue;
        }

        match ch {
            '\\' if in_string => {
                escape = true;
                result.push(ch);
            }
            '"' => {
                in_string = !in_string;
                result.push(ch);
            }
            '\n' | '\r' if in_string => {
                result.push('"');
                in_string = false;
                result.push(ch);
            }
            _ => result.push(ch),
        }
    }

    if in_string {
        result.push('"');
    }

    result
}

fn remove_control_chars(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_json() {
        let repairer = JsonRepairer::new();
        let (_, repaired) = repairer.parse_or_repair(r#"{"key": "value"}"#).unwrap();
        assert!(!repaired);
    }

    #[test]
    fn test_strip_code_fences() {
        let value = extract_json_object("```json\n{\"key\": \"value\"}\n```").unwrap();
        assert_eq!(value["key"], "value");
        assert_eq!(strip_code_fences("```html\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(strip_code_fences("<p>plain</p>"), "<p>plain</p>");
    }

    #[test]
    fn test_extract_from_prose() {
        let input = r#"Sure! Here is the outline:
{"title": "Light", "topics": [{"title": "Waves {and} particles"}]}
Let me know if you need more."#;
        let value = extract_json_object(input).unwrap();
        assert_eq!(value["title"], "Light");
        assert_eq!(value["topics"][0]["title"], "Waves {and} particles");
    }

    #[test]
    fn test_escaped_quotes_do_not_end_strings() {
        let input = r#"note {"q": "say \"}\" twice", "n": 1} trailing"#;
        let value = extract_json_object(input).unwrap();
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_fix_trailing_comma() {
        let repairer = JsonRepairer::new();
        let input = r#"{"topics": [{"title": "A"},]}"#;
        let (value, repaired) = repairer.parse_or_repair(input).unwrap();
        assert!(repaired);
        assert!(value["topics"].is_array());
    }

    #[test]
    fn test_commas_inside_strings_are_kept() {
        let input = r#"{"a": "x,]", "b": [1,],}"#;
        let value = extract_json_object(input).unwrap();
        assert_eq!(value["a"], "x,]");
    }

    #[test]
    fn test_balance_truncated_object() {
        let repairer = JsonRepairer::new();
        let input = r#"{"topics": [{"title": "A"}"#;
        let (value, repaired) = repairer.parse_or_repair(input).unwrap();
        assert!(repaired);
        assert_eq!(value["topics"][0]["title"], "A");
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(extract_json_object("[1, 2, 3]").is_err());
        assert!(extract_json_object("\"just a string\"").is_err());
        assert!(extract_json_object("no json here").is_err());
    }

    #[test]
    fn test_object_extracted_from_array_reply() {
        let value =
            extract_json_object(r#"[{"title": "Photosynthesis", "topics": []}, {"title": "x"}]"#)
                .unwrap();
        assert_eq!(value["title"], "Photosynthesis");
        assert!(value["topics"].is_array());
    }
}
