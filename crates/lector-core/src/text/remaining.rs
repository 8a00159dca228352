//! Locating where the visible snapshot ends inside the full document.

/// Tail windows, in characters, tried in order against the full text.
const TAIL_WINDOWS: [usize; 3] = [80, 40, 20];

/// Returns the part of `full` that follows the visible text.
///
/// The last characters of `visible` are searched for in `full` after folding
/// whitespace runs and typographic quotes on both sides; longer tails are
/// tried first. When the tail occurs more than once the first occurrence
/// wins. When nothing matches, `full` is returned unchanged.
pub fn remaining_text(visible: &str, full: &str) -> String {
    let visible = fold(visible);
    let needle_source = visible.text.trim();
    if needle_source.is_empty() {
        return full.to_string();
    }

    let haystack = fold(full);
    for window in TAIL_WINDOWS {
        let needle = tail_chars(needle_source, window);
        if let Some(found) = haystack.text.find(needle) {
            let end = haystack.original_end(found + needle.len());
            return full[end..].trim_start().to_string();
        }
    }

    tracing::debug!("visible tail not found in document, reading from the start");
    full.to_string()
}

struct Folded {
    text: String,
    /// Original byte offset reached after each folded byte.
    ends: Vec<usize>,
}

impl Folded {
    fn original_end(&self, folded_end: usize) -> usize {
        if folded_end == 0 {
            return 0;
        }
        self.ends[folded_end - 1]
    }
}

fn fold(text: &str) -> Folded {
    let mut folded = Folded {
        text: String::with_capacity(text.len()),
        ends: Vec::with_capacity(text.len()),
    };
    let mut in_space = false;

    for (i, c) in text.char_indices() {
        let end = i + c.len_utf8();
        let mapped = match c {
            c if c.is_whitespace() => {
                if in_space {
                    continue;
                }
                in_space = true;
                ' '
            }
            '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            c => c,
        };
        if mapped != ' ' {
            in_space = false;
        }
        folded.text.push(mapped);
        folded
            .ends
            .extend(std::iter::repeat_n(end, mapped.len_utf8()));
    }
    folded
}

fn tail_chars(text: &str, count: usize) -> &str {
    match text.char_indices().rev().nth(count.saturating_sub(1)) {
        Some((start, _)) if count > 0 => &text[start..],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_text_after_visible_prefix() {
        let full = "First page text that is shown. Second page continues here.";
        let visible = "First page text that is shown.";
        assert_eq!(remaining_text(visible, full), "Second page continues here.");
    }

    #[test]
    fn test_matches_despite_whitespace_and_quote_differences() {
        let full = "He said \u{201C}stop\u{201D}\n\n and   left the room quietly. The end came later.";
        let visible = "He said \"stop\" and left the room quietly.";
        assert_eq!(remaining_text(visible, full), "The end came later.");
    }

    #[test]
    fn test_long_visible_text_uses_tail_only() {
        let body = "word ".repeat(40);
        let full = format!("{body}unique closing sentence here. After the fold.");
        let visible = format!("EXTRA HEADER NOT IN DOC {body}unique closing sentence here.");
        assert_eq!(remaining_text(&visible, &full), "After the fold.");
    }

    #[test]
    fn test_no_match_returns_full_text() {
        let full = "Completely different document.";
        assert_eq!(remaining_text("nothing in common at all", full), full);
    }

    #[test]
    fn test_empty_visible_returns_full_text() {
        assert_eq!(remaining_text("   ", "abc"), "abc");
    }

    #[test]
    fn test_repeated_passage_picks_first_occurrence() {
        let full = "Chorus line. Verse one. Chorus line. Verse two.";
        assert_eq!(
            remaining_text("Chorus line.", full),
            "Verse one. Chorus line. Verse two."
        );
    }

    #[test]
    fn test_visible_covering_everything_leaves_nothing() {
        let full = "All of it is visible.";
        assert_eq!(remaining_text(full, full), "");
    }
}
