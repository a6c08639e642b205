//! Pull JSON out of model responses.
//!
//! Models wrap JSON in markdown fences or surround it with chatter. Extraction
//! tries a fenced block first, then the first balanced array or object.

use storyreel_error::{GenerationError, GenerationErrorKind, StoryreelResult};

/// Extract a JSON document from a response that may contain markdown or extra text.
///
/// # Errors
///
/// `MalformedResponse` if no JSON is found.
///
/// # Examples
///
/// ```
/// use storyreel_pipeline::extract_json;
///
/// let response = "Here you go:\n```json\n[{\"description\": \"a gate\"}]\n```\n";
/// assert_eq!(extract_json(response).unwrap(), "[{\"description\": \"a gate\"}]");
/// ```
pub fn extract_json(response: &str) -> StoryreelResult<String> {
    if let Some(json) = extract_from_code_block(response) {
        if json.starts_with('[') || json.starts_with('{') {
            return Ok(json);
        }
    }

    // Whichever structure opens first wins; the other is the fallback.
    let array_first = match (response.find('['), response.find('{')) {
        (Some(b), Some(c)) => b < c,
        (Some(_), None) => true,
        _ => false,
    };
    let order = if array_first {
        [('[', ']'), ('{', '}')]
    } else {
        [('{', '}'), ('[', ']')]
    };
    for (open, close) in order {
        if let Some(json) = extract_balanced(response, open, close) {
            return Ok(json);
        }
    }

    tracing::error!(response_length = response.len(), "No JSON found in model response");
    Err(GenerationError::new(GenerationErrorKind::MalformedResponse(format!(
        "no JSON found in response (length: {})",
        response.len()
    )))
    .into())
}

fn extract_from_code_block(response: &str) -> Option<String> {
    let start = response.find("```")?;
    let after_fence = start + 3;
    // Skip the language tag, if any.
    let content_start = response[after_fence..]
        .find('\n')
        .map(|n| after_fence + n + 1)
        .unwrap_or(after_fence);
    let content = match response[content_start..].find("```") {
        Some(end) => &response[content_start..content_start + end],
        // Unclosed fence: the response was probably truncated.
        None => &response[content_start..],
    };
    Some(content.trim().to_string())
}

fn extract_balanced(response: &str, open: char, close: char) -> Option<String> {
    let start = response.find(open)?;
    let mut depth = 0usize;
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
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(response[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse extracted JSON into `T`.
///
/// # Errors
///
/// `MalformedResponse` with a short preview of the offending JSON.
pub fn parse_json<T>(json: &str) -> StoryreelResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(json).map_err(|e| {
        let preview: String = json.chars().take(100).collect();
        tracing::error!(error = %e, json_preview = %preview, "JSON parsing failed");
        GenerationError::new(GenerationErrorKind::MalformedResponse(format!(
            "failed to parse JSON: {} (JSON: {}...)",
            e, preview
        )))
        .into()
    })
}
