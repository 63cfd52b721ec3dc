//! Text tools: normalizer preview and filter-expression checker.

use std::path::PathBuf;

use crate::config::SettingsStore;
use crate::search::normalize::{StopWords, prepare_query};
use crate::search::{
    Field, FieldMatches, SearchApproachConfig, TextProcessingConfig, create_search_string,
    normalize, parse_filter_expression, remove_featuring,
};

/// One line of the normalize preview: label and resulting text
type PreviewLine = (String, String);

fn preview(
    text: &str,
    artist: Option<&str>,
    approaches: &[SearchApproachConfig],
    processing: &TextProcessingConfig,
) -> Vec<PreviewLine> {
    let stop_words = StopWords::new(&processing.filter_out_words);
    let mut lines = vec![
        ("normalized".to_string(), normalize(text)),
        ("without featuring".to_string(), remove_featuring(text)),
        ("search string".to_string(), create_search_string(text, artist)),
    ];
    for approach in approaches {
        lines.push((
            format!("query [{}]", approach.id),
            prepare_query(text, approach, processing, &stop_words),
        ));
    }
    lines
}

/// Show every transformation applied to `text`
pub fn cmd_normalize(config: Option<PathBuf>, text: &str, artist: Option<&str>) {
    let settings = SettingsStore::open(config).snapshot();
    let lines = preview(
        text,
        artist,
        &settings.search.approaches,
        &settings.search.text_processing,
    );

    let width = lines.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    println!("Input: {:?}", text);
    for (label, value) in lines {
        println!("  {:<width$}  {:?}", label, value, width = width);
    }
}

/// Resolve `--set` flags into field outcomes
fn field_matches(fields: &[(String, bool)]) -> anyhow::Result<FieldMatches> {
    let mut flags = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let field = Field::parse(name).ok_or_else(|| {
            let known: Vec<_> = Field::ALL.iter().map(|f| f.as_str()).collect();
            anyhow::anyhow!("Unknown field '{}' (known: {})", name, known.join(", "))
        })?;
        flags.push((field, *value));
    }
    Ok(FieldMatches::from_flags(flags))
}

/// Parse a filter expression and evaluate it when field outcomes are given
pub fn cmd_filter(expression: &str, fields: &[(String, bool)]) -> anyhow::Result<()> {
    let predicate = parse_filter_expression(expression)?;
    let used: Vec<_> = predicate.fields().into_iter().map(|f| f.as_str()).collect();

    println!("Parsed: {}", predicate);
    println!("Fields: {}", used.join(", "));

    if fields.is_empty() {
        return Ok(());
    }

    let matches = field_matches(fields)?;
    let result = predicate.evaluate(&matches)?;
    println!("Result: {}", if result { "✓ accepted" } else { "✗ rejected" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::default_approaches;

    fn value<'a>(lines: &'a [PreviewLine], label: &str) -> &'a str {
        lines
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[test]
    fn test_preview_lists_every_approach() {
        let lines = preview(
            "Yesterday - Remastered 2009",
            Some("The Beatles"),
            &default_approaches(),
            &TextProcessingConfig::default(),
        );
        assert_eq!(lines.len(), 3 + default_approaches().len());
        assert_eq!(value(&lines, "query [normal]"), "yesterday - remastered 2009");
        assert_eq!(value(&lines, "query [trimmed]"), "yesterday");
        assert!(value(&lines, "search string").starts_with("the beatles"));
    }

    #[test]
    fn test_field_matches_rejects_unknown_field() {
        let err = field_matches(&[("genre".to_string(), true)]).unwrap_err();
        assert!(err.to_string().contains("genre"));
    }

    #[test]
    fn test_field_names_are_case_insensitive() {
        let matches = field_matches(&[("ARTIST".to_string(), true)]).unwrap();
        assert!(matches.get(Field::Artist).is_some());
    }

    #[test]
    fn test_cmd_filter() {
        assert!(cmd_filter("artist:match AND title:match", &[]).is_ok());
        assert!(
            cmd_filter(
                "artist:match AND title:match",
                &[("artist".to_string(), true), ("title".to_string(), false)]
            )
            .is_ok()
        );
        assert!(cmd_filter("artist:match AND", &[]).is_err());
        // title has no outcome
        assert!(cmd_filter("title:match", &[("artist".to_string(), true)]).is_err());
    }
}
