//! Utilities for extracting structured data from backend responses.
//!
//! Responses often wrap JSON in markdown fences or surround it with prose.
//! Failures here are [`JsonError`]s; callers recover with conservative
//! defaults rather than propagating them.

use folio_error::{FolioResult, JsonError};

/// Extract a JSON document from a response that may contain markdown or extra text.
///
/// Strategies, in order:
/// 1. Fenced code block (```json or bare ```)
/// 2. Whichever of a balanced `{ ... }` or `[ ... ]` starts first
///
/// # Errors
///
/// Returns a [`JsonError`] if no JSON-looking span is found.
///
/// # Examples
///
/// ```
/// use folio_generation::extract_json;
///
/// let response = "Scores below:\n```json\n{\"score\": 82}\n```\n";
/// assert_eq!(extract_json(response).unwrap(), "{\"score\": 82}");
/// ```
pub fn extract_json(response: &str) -> FolioResult<String> {
    if let Some(json) = extract_from_code_block(response) {
        return Ok(json);
    }

    let bracket_pos = response.find('[');
    let brace_pos = response.find('{');
    let order: [(char, char); 2] = match (bracket_pos, brace_pos) {
        (Some(b), Some(c)) if b < c => [('[', ']'), ('{', '}')],
        (Some(_), None) => [('[', ']'), ('{', '}')],
        _ => [('{', '}'), ('[', ']')],
    };
    for (open, close) in order {
        if let Some(json) = extract_balanced(response, open, close) {
            return Ok(json);
        }
    }

    Err(JsonError::new(format!(
        "No JSON found in response (length: {})",
        response.len()
    ))
    .into())
}

/// Fenced block contents; an unterminated fence runs to the end of the response.
fn extract_from_code_block(response: &str) -> Option<String> {
    let start = response.find("```")?;
    let after_fence = start + 3;
    let body_start = response[after_fence..]
        .find('\n')
        .map(|n| after_fence + n + 1)
        .unwrap_or(after_fence);
    let body = match response[body_start..].find("```") {
        Some(end) => &response[body_start..body_start + end],
        None => &response[body_start..],
    };
    let body = body.trim();
    if body.starts_with('{') || body.starts_with('[') {
        Some(body.to_string())
    } else {
        None
    }
}

/// Content from the first `open` to its matching `close`, honouring string escapes.
fn extract_balanced(response: &str, open: char, close: char) -> Option<String> {
    let start = response.find(open)?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(response[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a JSON string into `T`.
///
/// # Errors
///
/// Returns a [`JsonError`] carrying a short preview of the input.
pub fn parse_json<T>(json_str: &str) -> FolioResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(json_str).map_err(|e| {
        let preview = json_str.chars().take(100).collect::<String>();
        JsonError::new(format!("Failed to parse JSON: {} (JSON: {}...)", e, preview)).into()
    })
}

/// Extract and parse in one step.
///
/// # Examples
///
/// ```
/// use folio_generation::parse_response;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Score {
///     score: f64,
/// }
///
/// let parsed: Score = parse_response("Result: {\"score\": 64.5} done").unwrap();
/// assert_eq!(parsed.score, 64.5);
/// ```
pub fn parse_response<T>(response: &str) -> FolioResult<T>
where
    T: serde::de::DeserializeOwned,
{
    parse_json(&extract_json(response)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_fenced_block() {
        let response = "Here you go:\n\n```json\n{\n  \"score\": 71\n}\n```\n\nThanks!";
        let json = extract_json(response).unwrap();
        assert!(json.contains("\"score\": 71"));
    }

    #[test]
    fn extracts_unterminated_fence() {
        let response = "```json\n{\"score\": 71}";
        assert_eq!(extract_json(response).unwrap(), "{\"score\": 71}");
    }

    #[test]
    fn fence_without_json_falls_back_to_braces() {
        let response = "```\nnot json\n```\n{\"a\": 1}";
        assert_eq!(extract_json(response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn extracts_nested_object_from_prose() {
        let response = r#"Sure: {"id": 4, "nested": {"v": "}"}} trailing"#;
        let json = extract_json(response).unwrap();
        assert_eq!(json, r#"{"id": 4, "nested": {"v": "}"}}"#);
    }

    #[test]
    fn prefers_whichever_structure_opens_first() {
        let response = r#"[{"id": 1}, {"id": 2}]"#;
        assert!(extract_json(response).unwrap().starts_with('['));
    }

    #[test]
    fn handles_escaped_quotes() {
        let response = r#"{"text": "She said \"hi\" {"}"#;
        assert_eq!(extract_json(response).unwrap(), response);
    }

    #[test]
    fn plain_text_is_an_error() {
        assert!(extract_json("no structure here").is_err());
        assert!(extract_json("{ unbalanced").is_err());
    }

    #[test]
    fn parse_failure_is_reported() {
        let result: FolioResult<Vec<u32>> = parse_response("[1, 2, oops]");
        assert!(result.is_err());
    }
}
