//! Text normalization for title and artist comparison.
//!
//! Everything here is a pure function of its input: no configuration is
//! read implicitly, so the same text always normalizes the same way.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::approach::{SearchApproachConfig, TextProcessingConfig};

/// `(feat. X)`, `[ft. X]`, `(featuring X)`
static BRACKETED_FEATURING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[\(\[](?:featuring|feat|ft)\b\.?[^\)\]]*[\)\]]")
        .expect("bracketed featuring pattern")
});

/// `Song feat. X`, `Song ft X` up to the end of the title
static TRAILING_FEATURING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:featuring|feat|ft)\b\.?.*$").expect("trailing featuring pattern")
});

/// `()`, `[ ]`, `{}` left behind after stop-word removal
static EMPTY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\(\[\{]\s*[\)\]\}]").expect("empty bracket pattern"));

/// Canonicalize text for comparison.
///
/// Lowercases, folds diacritics (`Café` -> `cafe`), expands ligatures,
/// drops punctuation and collapses whitespace. Letters outside the Latin
/// alphabet are kept so non-Latin titles don't normalize to nothing.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfkd().filter(|c| !is_combining_mark(*c)) {
        for lc in c.to_lowercase() {
            push_folded(&mut out, lc);
        }
    }
    collapse_whitespace(&out)
}

fn push_folded(out: &mut String, c: char) {
    match c {
        'æ' => out.push_str("ae"),
        'œ' => out.push_str("oe"),
        'ß' => out.push_str("ss"),
        'þ' => out.push_str("th"),
        'ø' => out.push('o'),
        'đ' | 'ð' => out.push('d'),
        'ł' => out.push('l'),
        'ı' => out.push('i'),
        c if c.is_whitespace() => out.push(' '),
        c if c.is_alphanumeric() => {
            // Compatibility forms can decompose to uppercase (e.g. modifier letters)
            for d in c.to_string().nfkd().filter(|d| !is_combining_mark(*d)) {
                out.extend(d.to_lowercase().filter(|l| l.is_alphanumeric()));
            }
        }
        _ => {}
    }
}

/// Collapse runs of whitespace into single spaces and trim both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip featured-artist clauses from a title.
///
/// ```ignore
/// assert_eq!(remove_featuring("Song (feat. Artist)"), "Song");
/// assert_eq!(remove_featuring("Song ft. Artist"), "Song");
/// ```
pub fn remove_featuring(title: &str) -> String {
    let without_brackets = BRACKETED_FEATURING.replace_all(title, "");
    let without_trailing = TRAILING_FEATURING.replace(&without_brackets, "");
    without_trailing.trim().to_string()
}

/// Build the normalized search form of a title, optionally prefixed by artist
pub fn create_search_string(title: &str, artist: Option<&str>) -> String {
    let title = remove_featuring(title);
    match artist {
        Some(artist) => normalize(&format!("{} {}", artist, title)),
        None => normalize(&title),
    }
}

/// A compiled set of stop words/phrases removed as whole words.
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    pattern: Option<Regex>,
}

impl StopWords {
    /// Compile `words` into a single case-insensitive whole-word pattern.
    ///
    /// Longer words are tried first so `remastered` wins over `remaster`.
    pub fn new<S: AsRef<str>>(words: &[S]) -> Self {
        let mut words: Vec<&str> = words
            .iter()
            .map(|w| w.as_ref().trim())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return Self::default();
        }
        words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        words.dedup();

        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).ok();
        if pattern.is_none() {
            tracing::warn!("Could not compile stop word pattern, stop words disabled");
        }
        Self { pattern }
    }

    /// Remove every stop word from `text` and re-collapse whitespace
    pub fn strip(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => collapse_whitespace(&pattern.replace_all(text, " ")),
            None => collapse_whitespace(text),
        }
    }
}

/// Remove each of `words` from `text` as a whole-word, case-insensitive match
pub fn filter_out_words<S: AsRef<str>>(text: &str, words: &[S]) -> String {
    StopWords::new(words).strip(text)
}

/// Build the text sent to the catalog for one approach.
///
/// Lowercases, then applies the approach's switches in order: stop-word
/// removal (`filtered`), quote removal (`remove_quotes`), dropping empty
/// brackets, and cutting everything after the last separator (`trim`).
pub fn prepare_query(
    text: &str,
    approach: &SearchApproachConfig,
    processing: &TextProcessingConfig,
    stop_words: &StopWords,
) -> String {
    let mut result = text.to_lowercase();

    if approach.filtered {
        result = stop_words.strip(&result);
    }

    if approach.remove_quotes {
        for quote in &processing.filter_out_quotes {
            if !quote.is_empty() {
                result = result.replace(quote.as_str(), "");
            }
        }
    }

    result = EMPTY_BRACKETS.replace_all(&result, "").into_owned();

    if approach.trim {
        for separator in &processing.cut_off_separators {
            if separator.is_empty() {
                continue;
            }
            // Never cut a query down to nothing
            if let Some(idx) = result.rfind(separator.as_str())
                && idx > 0
            {
                result.truncate(idx);
            }
        }
    }

    collapse_whitespace(result.trim_matches(|c: char| c == '-' || c.is_whitespace()))
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Titles drawn from Latin letters, accented letters, digits and common punctuation
    fn title() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9À-ÖØ-öø-ÿ ,.'()!&-]{0,40}").unwrap()
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(input in title()) {
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_is_case_insensitive(input in title()) {
            prop_assert_eq!(normalize(&input.to_uppercase()), normalize(&input.to_lowercase()));
        }

        #[test]
        fn normalize_output_has_no_edge_or_double_spaces(input in title()) {
            let out = normalize(&input);
            prop_assert!(!out.starts_with(' ') && !out.ends_with(' '));
            prop_assert!(!out.contains("  "));
        }

        #[test]
        fn filter_out_words_is_idempotent(input in title()) {
            let words = ["remastered", "edit", "live"];
            let once = filter_out_words(&input, &words);
            prop_assert_eq!(filter_out_words(&once, &words), once);
        }
    }
}
