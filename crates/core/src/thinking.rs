//! Text utilities for the reasoning/thinking side channel.
//!
//! Backends surface model reasoning in two shapes: a structured field
//! streamed alongside the content, and inline `<think>`-style tags mixed
//! into the content itself. The helpers here strip the inline form,
//! filter out noise, merge incremental fragments, and pick the best of
//! the two when a stream finalizes.

use glimpse_backend::ChatMessage;

use crate::error::ChatError;

const THINKING_TAGS: [(&str, &str); 2] =
    [("<think>", "</think>"), ("<thinking>", "</thinking>")];

/// Removes inline thinking spans from `text`.
///
/// Returns the cleaned (trimmed) text and, if any spans matched, the
/// trimmed inner contents joined with a blank line. Unterminated tags
/// are left in place.
pub fn extract_inline_thinking(text: &str) -> (String, Option<String>) {
    let mut cleaned = text.to_owned();
    let mut parts: Vec<String> = Vec::new();
    for (open, close) in THINKING_TAGS {
        cleaned = strip_tag_spans(&cleaned, open, close, &mut parts);
    }

    let thinking = if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n").trim().to_owned())
    };
    (
        cleaned.trim().to_owned(),
        thinking.filter(|t| !t.is_empty()),
    )
}

fn strip_tag_spans(
    text: &str,
    open: &str,
    close: &str,
    parts: &mut Vec<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(start) = find_ignore_ascii_case(rest, open) else {
            out.push_str(rest);
            break;
        };
        let inner_start = start + open.len();
        let Some(inner_len) =
            find_ignore_ascii_case(&rest[inner_start..], close)
        else {
            out.push_str(rest);
            break;
        };

        out.push_str(&rest[..start]);
        let inner = rest[inner_start..inner_start + inner_len].trim();
        if !inner.is_empty() {
            parts.push(inner.to_owned());
        }
        rest = &rest[inner_start + inner_len + close.len()..];
    }
    out
}

// The tags are ASCII, so matched positions always fall on character
// boundaries.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Normalizes a raw thinking value.
///
/// Returns `None` for empty or whitespace-only input, and for input
/// consisting solely of `.`, `?` or `!`. Some backends stream a lone
/// "." that would otherwise read as a false reasoning signal.
pub fn normalize_thinking(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().all(|c| matches!(c, '.' | '?' | '!')) {
        return None;
    }
    Some(trimmed.to_owned())
}

/// Merges an incremental stream fragment into the accumulated text.
///
/// Streaming reasoning arrives as cumulative or delta fragments
/// depending on the backend: if `next` already starts with `current` it
/// is the new cumulative value and replaces it, otherwise it is a delta
/// and is appended.
pub fn merge_stream_text(current: Option<&str>, next: &str) -> String {
    match current {
        None => next.to_owned(),
        Some(current) if next.starts_with(current) => next.to_owned(),
        Some(current) => {
            let mut merged =
                String::with_capacity(current.len() + next.len());
            merged.push_str(current);
            merged.push_str(next);
            merged
        }
    }
}

/// Picks the best thinking text between the structured stream field and
/// the text mined from inline tags.
///
/// The structured value wins unless it is a near-empty placeholder
/// (at most 2 words and 24 characters) and an extracted value exists.
pub fn choose_thinking(
    structured: Option<&str>,
    extracted: Option<&str>,
) -> Option<String> {
    let Some(extracted) = extracted else {
        return structured.map(str::to_owned);
    };
    let Some(structured) = structured else {
        return Some(extracted.to_owned());
    };
    let words = structured.split_whitespace().count();
    if words <= 2 && structured.chars().count() <= 24 {
        Some(extracted.to_owned())
    } else {
        Some(structured.to_owned())
    }
}

/// Finalizes a completed stream into an assistant history message plus
/// its thinking text.
///
/// An assistant turn with nothing to show is an error, not a valid
/// empty message; reasoning-only completions are valid.
pub fn finalize_assistant(
    content: &str,
    streamed_thinking: Option<&str>,
) -> Result<(ChatMessage, Option<String>), ChatError> {
    let structured = normalize_thinking(streamed_thinking);
    let (cleaned, extracted) = extract_inline_thinking(content);
    let extracted = normalize_thinking(extracted.as_deref());
    let thinking =
        choose_thinking(structured.as_deref(), extracted.as_deref());

    if cleaned.is_empty() && thinking.is_none() {
        return Err(ChatError::empty_response());
    }
    Ok((ChatMessage::assistant(cleaned), thinking))
}
