/// Characters outside 7-bit ASCII the displays can still show.
pub const EXTRA_CHARACTERS: [char; 7] = ['ä', 'ö', 'ü', 'Ä', 'Ö', 'Ü', 'ß'];

pub fn is_supported(c: char) -> bool {
    c.is_ascii() || EXTRA_CHARACTERS.contains(&c)
}

/// Drop every character the displays cannot show. Nothing is substituted.
pub fn filter(text: &str) -> String {
    text.chars().filter(|c| is_supported(*c)).collect()
}

/// Cut `text` down to at most `max_chars` characters.
pub fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::filter;
    use super::truncate;

    #[test]
    fn test_filter_keeps_ascii() {
        assert_eq!(filter("Hello, world! 12:34"), "Hello, world! 12:34");
    }

    #[test]
    fn test_filter_keeps_umlauts() {
        assert_eq!(filter("Grüße aus Köln"), "Grüße aus Köln");
    }

    #[test]
    fn test_filter_drops_emoji_and_accents() {
        assert_eq!(filter("Hi 🚌 café"), "Hi  caf");
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("Köln Hbf", 4), "Köln");
        assert_eq!(truncate("abc", 36), "abc");
        assert_eq!(truncate("abc", 0), "");
    }
}
