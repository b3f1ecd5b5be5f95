//! Lenient extraction of JSON payloads from model replies

/// Strip a surrounding markdown code fence (```json ... ``` or ``` ... ```)
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag on the opening fence line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Slice from the first `{` to the last `}`
pub fn extract_json_object(text: &str) -> Option<&str> {
    extract_between(text, '{', '}')
}

/// Slice from the first `[` to the last `]`
pub fn extract_json_array(text: &str) -> Option<&str> {
    extract_between(text, '[', ']')
}

fn extract_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;

    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Parse a JSON value from a model reply, tolerating code fences and prose
/// around the payload
pub fn parse_lenient(text: &str) -> Option<serde_json::Value> {
    let unfenced = strip_code_fence(text);

    if let Ok(value) = serde_json::from_str(unfenced) {
        return Some(value);
    }

    [extract_json_object(unfenced), extract_json_array(unfenced)]
        .into_iter()
        .flatten()
        .find_map(|candidate| serde_json::from_str(candidate).ok())
}
