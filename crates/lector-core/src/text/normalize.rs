//! Deterministic local text cleanup.
//!
//! Repairs the spacing artifacts PDF text layers tend to produce: words
//! spelled out letter by letter, detached hyphens and apostrophes, loose
//! punctuation and typographic quotes. No I/O, never fails. This is also the
//! local fallback whenever remote preprocessing is unavailable.

use std::sync::LazyLock;

use regex::Regex;

/// Upper bound on full-pipeline passes while looking for a fixed point.
const MAX_PASSES: usize = 8;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

static SPACED_HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w) ?- ?(\w)").expect("hyphen regex"));

static SPACED_APOSTROPHE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\p{L}) ?' ?((?i:s|t|d|ll|re|ve|m))\b").expect("apostrophe regex")
});

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +([,.;:!?])").expect("punctuation regex"));

static CLAUSE_PUNCT_GLUED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([,;])(\p{L})").expect("clause regex"));

static SENTENCE_PUNCT_GLUED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\p{Ll})([.!?])(\p{Lu})").expect("sentence regex"));

static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("space regex"));

/// Normalizes extracted document text for display and speech.
///
/// The cleanup pipeline is re-applied until the output stops changing, so
/// `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    let mut current = normalize_pass(text);
    for _ in 1..MAX_PASSES {
        let next = normalize_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn normalize_pass(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let joined = join_spaced_letters(&collapsed);
    let hyphenated = SPACED_HYPHEN.replace_all(&joined, "${1}-${2}");
    let apostrophes = hyphenated.replace(['\u{2018}', '\u{2019}'], "'");
    let apostrophes = SPACED_APOSTROPHE.replace_all(&apostrophes, "${1}'${2}");
    let punctuated = SPACE_BEFORE_PUNCT.replace_all(&apostrophes, "${1}");
    let punctuated = CLAUSE_PUNCT_GLUED.replace_all(&punctuated, "${1} ${2}");
    let punctuated = SENTENCE_PUNCT_GLUED.replace_all(&punctuated, "${1}${2} ${3}");
    let quoted = tighten_double_quotes(&punctuated);
    MULTI_SPACE.replace_all(&quoted, " ").trim().to_string()
}

/// Rejoins runs of single letters separated by spaces ("r e a d" -> "read"),
/// repeating until nothing changes.
fn join_spaced_letters(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = join_letter_runs_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn join_letter_runs_once(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut run = String::new();

    for token in text.split(' ') {
        if is_single_letter(token) {
            run.push_str(token);
            continue;
        }
        if !run.is_empty() {
            out.push(std::mem::take(&mut run));
        }
        out.push(token.to_string());
    }
    if !run.is_empty() {
        out.push(run);
    }

    out.join(" ")
}

fn is_single_letter(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

/// Converts typographic double quotes to `"` and removes the padding inside
/// each quoted span.
fn tighten_double_quotes(text: &str) -> String {
    let text = text.replace(['\u{201C}', '\u{201D}', '\u{201E}'], "\"");
    let segments: Vec<&str> = text.split('"').collect();
    let last = segments.len() - 1;

    let mut out = String::with_capacity(text.len());
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push('"');
        }
        let inside_quotes = i % 2 == 1;
        if inside_quotes && i < last {
            out.push_str(segment.trim());
        } else if inside_quotes {
            // Unterminated quote: only the opening side is known.
            out.push_str(segment.trim_start());
        } else {
            out.push_str(segment);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_stays_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\t "), "");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("The  quick\n\tbrown   fox"), "The quick brown fox");
    }

    #[test]
    fn test_rejoins_letter_spaced_words() {
        assert_eq!(normalize("r e a d i n g is fun"), "reading is fun");
        assert_eq!(normalize("We like C H A P T E R s"), "We like CHAPTERs");
    }

    #[test]
    fn test_letter_spacing_leaves_lone_letters_alone() {
        assert_eq!(normalize("I saw a cat"), "I saw a cat");
    }

    #[test]
    fn test_collapses_spaced_hyphens() {
        assert_eq!(normalize("a well - known fact"), "a well-known fact");
        assert_eq!(normalize("state -of- the -art"), "state-of-the-art");
    }

    #[test]
    fn test_tightens_contractions_and_possessives() {
        assert_eq!(normalize("I don ' t know"), "I don't know");
        assert_eq!(normalize("John \u{2019} s book"), "John's book");
        assert_eq!(normalize("we ' ll see"), "we'll see");
    }

    #[test]
    fn test_punctuation_spacing() {
        assert_eq!(normalize("Hello , world .Next one"), "Hello, world. Next one");
        assert_eq!(normalize("red,green;blue"), "red, green; blue");
        assert_eq!(normalize("Wait !Really ?"), "Wait! Really?");
    }

    #[test]
    fn test_numbers_keep_their_separators() {
        assert_eq!(normalize("It costs 1,000.50 today"), "It costs 1,000.50 today");
    }

    #[test]
    fn test_double_quote_spacing() {
        assert_eq!(
            normalize("He said \u{201C} hello there \u{201D} loudly"),
            "He said \"hello there\" loudly"
        );
        assert_eq!(normalize("an \" open quote"), "an \"open quote");
    }

    #[test]
    fn test_urls_pass_through() {
        let text = "see https://example.com/a/b?x=1, then www.test.org";
        assert_eq!(normalize(text), text);
    }

    #[test]
    fn test_clean_text_is_unchanged() {
        let text = "A clean sentence. Another one, with a comma!";
        assert_eq!(normalize(text), text);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "a,b c",
            "x; y z",
            "\" a b \"",
            "a - b c",
            "T h e  e n d .N e x t",
            "word , , word",
            "don ' t \u{201C} stop \u{201D} me - now",
            "x.Y z",
            "\" unterminated  q u o t e",
            "1 , 2 , 3 . . .",
            "https://example.com/a?b=c d e f",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }
}
