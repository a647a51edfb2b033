//! JSON object extraction from free-form completion text.
use super::CompletionError;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Extract the first JSON object embedded in a completion.
///
/// A surrounding Markdown fence is removed first; after that the first `{`
/// that starts a complete object wins and any trailing prose is ignored.
pub fn extract_object(raw: &str) -> Result<Map<String, Value>, CompletionError> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    for (idx, ch) in cleaned.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(&cleaned[idx..]);
        if let Ok(object) = Map::<String, Value>::deserialize(&mut deserializer) {
            return Ok(object);
        }
    }
    Err(CompletionError::NoJsonObject {
        preview: preview(&cleaned),
    })
}

/// Remove a leading ```` ```json ```` / ```` ``` ```` line and a trailing fence.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines
        .first()
        .is_some_and(|first| first.trim_start().starts_with("```"))
    {
        lines.remove(0);
    }
    if lines
        .last()
        .is_some_and(|last| last.trim_start().starts_with("```"))
    {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 120;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
