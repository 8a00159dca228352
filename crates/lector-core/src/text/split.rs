//! Chunk splitting for sequential speech synthesis.
//!
//! Lengths and offsets are UTF-8 byte offsets; every cut lands on a `char`
//! boundary. A detected URL is never split across two chunks, even when that
//! makes a chunk longer than requested.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Factor applied to `max_len` when deciding whether a chunk is folded into
/// its predecessor.
const MERGE_FACTOR: f64 = 1.2;

/// Multiple of `max_len` scanned past the target for a sentence end.
const SENTENCE_LOOKAHEAD: usize = 2;

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)(?:https?://|www\.)\S+",
        r"|\b[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*",
        r"\.(?:com|org|net|edu|gov|io|dev|app|ai|co|uk|de|fr|es|it|nl|info|biz)\b(?:/\S*)?",
    ))
    .expect("url regex")
});

/// A chunk of text ready for synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    pub content: String,
    pub ordinal: usize,
    pub is_first: bool,
}

/// Byte range of one URL detected in a source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlRange {
    pub start: usize,
    pub end: usize,
}

impl UrlRange {
    /// True when a cut at `pos` would split this URL.
    fn splits_at(&self, pos: usize) -> bool {
        self.start < pos && pos < self.end
    }

    fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }
}

/// Finds URL-like spans (`http(s)://`, `www.`, bare domains).
///
/// Returned ranges are sorted by `start` and never overlap. Trailing sentence
/// punctuation is not considered part of the URL.
pub fn find_url_ranges(text: &str) -> Vec<UrlRange> {
    URL.find_iter(text)
        .filter_map(|m| {
            let trimmed = m
                .as_str()
                .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}', '"', '\'']);
            (!trimmed.is_empty()).then(|| UrlRange {
                start: m.start(),
                end: m.start() + trimmed.len(),
            })
        })
        .collect()
}

/// Splits `text` into chunks of roughly `max_len` bytes.
///
/// `first_len`, when given, sizes the first chunk so playback can start
/// early. Returns an empty vector for blank text or a zero `max_len`.
pub fn split_text(text: &str, max_len: usize, first_len: Option<usize>) -> Vec<String> {
    if max_len == 0 || text.trim().is_empty() {
        return Vec::new();
    }

    let urls = find_url_ranges(text);
    let first_len = first_len.filter(|len| *len > 0);
    let merge_limit = max_len as f64 * MERGE_FACTOR;

    let mut chunks: Vec<String> = Vec::new();
    let mut first_is_pinned = false;
    let mut idx = 0;

    while idx < text.len() {
        let target = match first_len {
            Some(len) if chunks.is_empty() => len,
            _ => max_len,
        };

        let mut cut = find_cut(text, idx, target, max_len, &urls);
        if let Some(stray) = stray_symbol_start(text, idx, cut) {
            cut = stray;
        }

        let piece = text[idx..cut].trim();
        idx = cut;
        if piece.is_empty() {
            continue;
        }

        let pinned = first_is_pinned && chunks.len() == 1;
        let mergeable = !pinned
            && chunks
                .last()
                .is_some_and(|prev| ((prev.len() + piece.len()) as f64) < merge_limit);

        match chunks.last_mut() {
            Some(prev) if mergeable => {
                prev.push(' ');
                prev.push_str(piece);
            }
            _ => {
                if chunks.is_empty() && first_len.is_some() {
                    first_is_pinned = true;
                }
                chunks.push(piece.to_string());
            }
        }
    }

    chunks
}

/// Same as [`split_text`], with ordinals attached.
pub fn text_chunks(text: &str, max_len: usize, first_len: Option<usize>) -> Vec<TextChunk> {
    split_text(text, max_len, first_len)
        .into_iter()
        .enumerate()
        .map(|(ordinal, content)| TextChunk {
            content,
            ordinal,
            is_first: ordinal == 0,
        })
        .collect()
}

fn find_cut(text: &str, start: usize, target: usize, max_len: usize, urls: &[UrlRange]) -> usize {
    let naive = start.saturating_add(target);
    if naive >= text.len() {
        return text.len();
    }
    let naive = char_boundary_after(text, start, naive);
    if naive >= text.len() {
        return text.len();
    }

    if let Some(url) = urls.iter().find(|url| url.splits_at(naive)) {
        return url.end;
    }

    let search_from = naive.saturating_sub(1).max(start);
    let search_to = char_boundary_before(
        text,
        naive
            .saturating_add(max_len.saturating_mul(SENTENCE_LOOKAHEAD))
            .min(text.len()),
    );
    if let Some(end) = sentence_end(text, search_from, search_to, urls) {
        return end;
    }

    match text[start..naive].rfind(' ') {
        Some(offset) if offset > 0 => start + offset,
        _ => naive,
    }
}

/// First position just past `.`, `!` or `?` followed by whitespace or the end
/// of the text, outside any URL.
fn sentence_end(text: &str, from: usize, to: usize, urls: &[UrlRange]) -> Option<usize> {
    let from = char_boundary_before(text, from);
    text[from..to].char_indices().find_map(|(offset, c)| {
        let pos = from + offset;
        if !matches!(c, '.' | '!' | '?') || urls.iter().any(|url| url.contains(pos)) {
            return None;
        }
        let after = pos + c.len_utf8();
        match text[after..].chars().next() {
            None => Some(after),
            Some(next) if next.is_whitespace() => Some(after),
            Some(_) => None,
        }
    })
}

/// When a chunk would end with a lone symbol token (a dangling `-` or `,`),
/// returns the offset of that symbol so it opens the next chunk instead.
fn stray_symbol_start(text: &str, start: usize, cut: usize) -> Option<usize> {
    if cut >= text.len() {
        return None;
    }
    let piece = text[start..cut].trim_end();
    let last = piece.chars().next_back()?;
    if last.is_alphanumeric() || matches!(last, '.' | '!' | '?' | '"' | '\'' | ')' | ']') {
        return None;
    }
    let before = &piece[..piece.len() - last.len_utf8()];
    if !before.ends_with(char::is_whitespace) || before.trim().is_empty() {
        return None;
    }
    Some(start + before.len())
}

fn char_boundary_before(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Nearest boundary at or below `pos`, moving forward instead when that would
/// not advance past `start`.
fn char_boundary_after(text: &str, start: usize, pos: usize) -> usize {
    let below = char_boundary_before(text, pos);
    if below > start {
        return below;
    }
    let mut pos = pos;
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}
