use std::borrow::Cow;

/// Appended to page content cut at the size ceiling.
pub const TRUNCATION_NOTICE: &str =
    "\n\n---\n*Content truncated (original too large for ClickUp)*\n";

/// Cut `content` to `max_chars` characters and append [`TRUNCATION_NOTICE`].
/// Content at or under the ceiling is returned unmodified.
pub fn truncate_content(content: &str, max_chars: usize) -> Cow<'_, str> {
    match content.char_indices().nth(max_chars) {
        None => Cow::Borrowed(content),
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_NOTICE.len());
            truncated.push_str(&content[..cut]);
            truncated.push_str(TRUNCATION_NOTICE);
            Cow::Owned(truncated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_at_ceiling_is_untouched() {
        let content = "a".repeat(10);
        assert!(matches!(truncate_content(&content, 10), Cow::Borrowed(_)));
        assert_eq!(truncate_content("", 0), "");
    }

    #[test]
    fn oversized_content_gets_notice() {
        let content = "a".repeat(11);
        let truncated = truncate_content(&content, 10);
        assert_eq!(truncated, format!("{}{}", "a".repeat(10), TRUNCATION_NOTICE));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let content = "é".repeat(5);
        assert_eq!(truncate_content(&content, 5), content);
        let truncated = truncate_content(&content, 3);
        assert!(truncated.starts_with("ééé\n\n---"));
    }
}
