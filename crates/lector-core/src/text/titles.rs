//! Heading boundary heuristics.
//!
//! Extracted text rarely keeps layout, but headings are often set in capitals.
//! A transition from an all-caps word to a normal one is treated as the end of
//! a heading. This over- and under-segments on irregular casing; callers use
//! it to pick a reasonable section, nothing more.

use std::ops::Range;

/// Bytes before the position searched for the heading word.
const LOOKBEHIND: usize = 50;

/// True when `position` looks like the first word after a heading.
///
/// The word before is the last whitespace-delimited token in the preceding
/// 50 bytes, with punctuation stripped (numbers and single characters fall
/// back one token, so "CHAPTER 1" still counts). Returns false when either
/// side has no word.
pub fn is_title_end(text: &str, position: usize) -> bool {
    if position > text.len() || !text.is_char_boundary(position) {
        return false;
    }

    let mut window_start = position.saturating_sub(LOOKBEHIND);
    while !text.is_char_boundary(window_start) {
        window_start += 1;
    }

    let before: Vec<&str> = text[window_start..position]
        .split_whitespace()
        .map(strip_punctuation)
        .filter(|word| !word.is_empty())
        .collect();
    let Some(mut heading_word) = before.last().copied() else {
        return false;
    };
    if is_number_or_single_char(heading_word) {
        match before.iter().rev().nth(1) {
            Some(word) => heading_word = word,
            None => return false,
        }
    }

    let Some(next_word) = text[position..].split_whitespace().next() else {
        return false;
    };

    is_shouting(heading_word) && !is_shouting(strip_punctuation(next_word))
}

/// Walks `text` in windows of `window` bytes and reports, per window, the
/// first word start for which [`is_title_end`] holds.
pub fn find_title_boundaries(text: &str, window: usize) -> Vec<usize> {
    if window == 0 {
        return Vec::new();
    }

    // Word starts are ascending, so one pass with a cursor covers every window.
    let starts = word_starts(text);
    let mut next = 0;
    let mut boundaries = Vec::new();
    let mut window_start = 0;
    while window_start < text.len() {
        let window_end = window_start.saturating_add(window);
        let mut found = None;
        while let Some(&pos) = starts.get(next)
            && pos < window_end
        {
            next += 1;
            if found.is_none() && is_title_end(text, pos) {
                found = Some(pos);
            }
        }
        boundaries.extend(found);
        window_start = window_end;
    }
    boundaries
}

/// Byte range of the section containing `position`: from the heading of the
/// nearest boundary at or before it up to the heading of the next one.
pub fn section_around(text: &str, position: usize, window: usize) -> Range<usize> {
    let position = position.min(text.len());
    let boundaries = find_title_boundaries(text, window);

    let start = boundaries
        .iter()
        .rev()
        .find(|b| **b <= position)
        .map_or(0, |b| heading_start(text, *b));
    let end = boundaries
        .iter()
        .find(|b| **b > position)
        .map_or(text.len(), |b| heading_start(text, *b));

    if end <= start {
        start..text.len()
    } else {
        start..end
    }
}

/// Start of the capitalized run ending right before `boundary`.
fn heading_start(text: &str, boundary: usize) -> usize {
    let mut start = boundary;
    for (offset, word) in tokens(&text[..boundary]).into_iter().rev() {
        let stripped = strip_punctuation(word);
        if is_shouting(stripped) || is_number_or_single_char(stripped) {
            start = offset;
        } else {
            break;
        }
    }
    start
}

fn word_starts(text: &str) -> Vec<usize> {
    tokens(text).into_iter().map(|(offset, _)| offset).collect()
}

fn tokens(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut current: Option<usize> = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), current) {
            (true, Some(start)) => {
                out.push((start, &text[start..i]));
                current = None;
            }
            (false, None) => current = Some(i),
            _ => {}
        }
    }
    if let Some(start) = current {
        out.push((start, &text[start..]));
    }
    out
}

fn strip_punctuation(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

fn is_number_or_single_char(word: &str) -> bool {
    word.chars().count() == 1 || word.chars().all(|c| c.is_ascii_digit())
}

fn is_shouting(word: &str) -> bool {
    let mut letters = word.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str, word: &str) -> usize {
        text.find(word).unwrap()
    }

    #[test]
    fn test_caps_to_prose_is_a_title_end() {
        let text = "...END OF CHAPTER Now the story continues";
        assert!(is_title_end(text, at(text, "Now")));
    }

    #[test]
    fn test_prose_to_prose_is_not_a_title_end() {
        let text = "regular text here Now it goes on";
        assert!(!is_title_end(text, at(text, "Now")));
    }

    #[test]
    fn test_numbered_heading_falls_back_one_word() {
        let text = "CHAPTER 1 It was a dark night";
        assert!(is_title_end(text, at(text, "It")));
    }

    #[test]
    fn test_caps_to_caps_is_not_a_title_end() {
        let text = "PART ONE THE BEGINNING";
        assert!(!is_title_end(text, at(text, "THE")));
    }

    #[test]
    fn test_missing_sides_are_false() {
        assert!(!is_title_end("Hello", 0));
        assert!(!is_title_end("TITLE ", 6));
        assert!(!is_title_end("", 0));
        assert!(!is_title_end("abc", 10));
    }

    #[test]
    fn test_position_inside_multibyte_char_is_false() {
        let text = "ÉTÉ été";
        assert!(!is_title_end(text, 1));
    }

    #[test]
    fn test_find_boundaries_per_window() {
        let text = "INTRODUCTION This book covers things. METHODS We did stuff.";
        assert_eq!(
            find_title_boundaries(text, 20),
            vec![at(text, "This"), at(text, "We")]
        );
        assert!(find_title_boundaries(text, 0).is_empty());
    }

    #[test]
    fn test_find_boundaries_across_many_windows() {
        let text = "CHAPTER ONE The story goes on. ".repeat(2_000);
        let window = 500;

        let boundaries = find_title_boundaries(&text, window);

        let expected: Vec<usize> = (0..text.len())
            .step_by(window)
            .filter_map(|start| {
                word_starts(&text)
                    .into_iter()
                    .filter(|pos| (start..start + window).contains(pos))
                    .find(|pos| is_title_end(&text, *pos))
            })
            .collect();
        assert_eq!(boundaries, expected);
        assert_eq!(boundaries.len(), text.len().div_ceil(window));
        assert!(boundaries.iter().all(|b| text[*b..].starts_with("The ")));
    }

    #[test]
    fn test_section_around_spans_between_headings() {
        let text = "INTRODUCTION This book covers things. METHODS We did stuff.";

        let first = section_around(text, at(text, "covers"), 20);
        assert_eq!(text[first].trim(), "INTRODUCTION This book covers things.");

        let second = section_around(text, at(text, "stuff"), 20);
        assert_eq!(&text[second], "METHODS We did stuff.");
    }

    #[test]
    fn test_section_around_without_headings_is_whole_text() {
        let text = "no headings anywhere in this text";
        assert_eq!(section_around(text, 5, 10), 0..text.len());
    }
}
