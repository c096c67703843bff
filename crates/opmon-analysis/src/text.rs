//! Small string helpers shared by the prompt-building stages.

/// Collapse all whitespace runs (including newlines) into single spaces.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Strip a surrounding markdown code fence from a model response.
pub(crate) fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Split free text into short clause-level points.
pub(crate) fn extract_points(text: &str, max_points: usize, max_len: usize) -> Vec<String> {
    let points: Vec<String> = text
        .split(['.', '!', '?', ';', ',', '。', '！', '？', '；', '，', '、'])
        .map(|p| sanitize_point(p, max_len))
        .filter(|p| !p.is_empty())
        .take(max_points)
        .collect();
    if points.is_empty() {
        let whole = sanitize_point(text, max_len);
        if whole.is_empty() {
            return Vec::new();
        }
        return vec![whole];
    }
    points
}

/// Single-line, trimmed, length-capped point text.
pub(crate) fn sanitize_point(text: &str, max_len: usize) -> String {
    truncate_chars(&normalize_whitespace(text), max_len)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "Hello 世界";
        assert_eq!(truncate_chars(text, 7), "Hello 世");
        assert_eq!(truncate_chars(text, 100), text);
    }

    #[test]
    fn strip_code_blocks_handles_fences() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn extract_points_splits_clauses() {
        let points = extract_points("Battery is great. Screen, however, is dim!", 3, 80);
        assert_eq!(points, vec!["Battery is great", "Screen", "however"]);
    }

    #[test]
    fn extract_points_of_blank_text_is_empty() {
        assert!(extract_points("   ", 3, 80).is_empty());
    }

    #[test]
    fn normalize_whitespace_collapses_newlines() {
        assert_eq!(normalize_whitespace(" a\n\tb  c "), "a b c");
    }
}
