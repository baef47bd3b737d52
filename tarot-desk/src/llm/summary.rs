// One-line summary extraction from a finished model response.
//
// The system prompt asks the model to end every reading with a section
// headed by SUMMARY_MARKER. The text after the last marker is the summary
// stored in history.

/// Heading the model is told to put before its closing one-line summary.
pub const SUMMARY_MARKER: &str = "### Summary";

/// Stored when the response has no usable summary section.
pub const FALLBACK_SUMMARY: &str = "Reading completed (no summary provided).";

/// Slice the trailing summary section out of `text`.
///
/// Matching on the marker ignores ASCII case. The section is trimmed, its
/// whitespace collapsed to single spaces, markdown emphasis stripped, and the
/// result truncated to `max_chars` characters with a trailing ellipsis.
pub fn extract_summary(text: &str, max_chars: usize) -> String {
    let lowered = text.to_ascii_lowercase();
    let marker = SUMMARY_MARKER.to_ascii_lowercase();

    let Some(pos) = lowered.rfind(&marker) else {
        return FALLBACK_SUMMARY.to_string();
    };
    let section = &text[pos + marker.len()..];

    let collapsed = section
        .trim_start_matches(':')
        .split_whitespace()
        .map(|w| w.trim_matches('*'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if collapsed.is_empty() {
        return FALLBACK_SUMMARY.to_string();
    }
    truncate_chars(&collapsed, max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}
