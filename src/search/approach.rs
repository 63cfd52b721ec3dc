//! Search approach and text-processing configuration.
//!
//! An approach is a named query-construction policy. Approaches run in the
//! order they are configured; see [`super::runner::SearchRunner`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One named search strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchApproachConfig {
    /// Unique id within a configuration
    pub id: String,
    /// Remove stop words (`remastered`, `radio edit`, ...) from the query
    pub filtered: bool,
    /// Cut the query at the last separator (`(`, `[`, `{`, `-`)
    pub trim: bool,
    /// Remove quote characters from the query
    pub remove_quotes: bool,
}

impl Default for SearchApproachConfig {
    fn default() -> Self {
        Self {
            id: "normal".to_string(),
            filtered: false,
            trim: false,
            remove_quotes: false,
        }
    }
}

impl SearchApproachConfig {
    fn new(id: &str, filtered: bool, trim: bool, remove_quotes: bool) -> Self {
        Self {
            id: id.to_string(),
            filtered,
            trim,
            remove_quotes,
        }
    }
}

/// Default approach order: plain first, then progressively looser queries
pub fn default_approaches() -> Vec<SearchApproachConfig> {
    vec![
        SearchApproachConfig::new("normal", false, false, false),
        SearchApproachConfig::new("filtered", true, false, true),
        SearchApproachConfig::new("trimmed", false, true, false),
        SearchApproachConfig::new("filtered_trimmed", true, true, true),
    ]
}

/// Check that approach ids are non-empty and unique
pub fn validate_approaches(approaches: &[SearchApproachConfig]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for approach in approaches {
        if approach.id.trim().is_empty() {
            return Err("search approach id must not be empty".to_string());
        }
        if !seen.insert(approach.id.as_str()) {
            return Err(format!("duplicate search approach id '{}'", approach.id));
        }
    }
    Ok(())
}

/// Word lists used when building queries and comparison forms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextProcessingConfig {
    /// Stop words/phrases removed by `filtered` approaches and before scoring
    pub filter_out_words: Vec<String>,
    /// Characters removed by `remove_quotes` approaches
    pub filter_out_quotes: Vec<String>,
    /// Separators a `trim` approach cuts at
    pub cut_off_separators: Vec<String>,
}

impl Default for TextProcessingConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            filter_out_words: strings(&[
                "original mix",
                "radio edit",
                "single edit",
                "alternate mix",
                "remastered",
                "remaster",
                "single version",
                "retail mix",
                "quartet",
            ]),
            filter_out_quotes: strings(&["'", "\"", "´", "`"]),
            cut_off_separators: strings(&["(", "[", "{", "-"]),
        }
    }
}
