use unicode_segmentation::UnicodeSegmentation;

/// Split text on Unicode sentence boundaries (UAX #29), trimmed, empties dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.unicode_sentences().map(str::trim).filter(|s| !s.is_empty()).collect()
}

pub fn count_sentences(text: &str) -> usize { split_sentences(text).len() }

pub fn ends_with_terminal_punctuation(text: &str) -> bool { text.trim_end().ends_with(|c: char| matches!(c, '.' | '!' | '?')) }

/// Keep at most `max_chars` characters, cutting on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
