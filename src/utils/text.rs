//! Text processing utilities.

/// Whether a string has no visible content.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Single-line preview: whitespace runs collapsed, cut to `max_chars` with an
/// ellipsis when shortened.
pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = truncate_chars(&collapsed, max_chars);
    if cut.len() < collapsed.len() {
        format!("{}...", cut.trim_end())
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("   \n\t  "));
        assert!(!is_blank(" a "));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("a  b\n\nc", 10), "a b c");
        assert_eq!(preview("one two three four", 7), "one two...");
    }
}
