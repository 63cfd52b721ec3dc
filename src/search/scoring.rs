//! Candidate scoring and ranking.
//!
//! Each field of a candidate is compared with the search item by
//! Sorensen-Dice bigram similarity of their comparison forms (stop words
//! removed, then normalized; titles also lose featuring clauses, artist
//! names never do). Identical forms score 1.0. A field "matches" when its score reaches
//! [`ScoringConfig::match_threshold`].
//!
//! Match filters are tried in order as tiers: the first tier that accepts
//! at least one candidate decides the result set, and its `reason` is
//! attached to every accepted candidate.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::approach::TextProcessingConfig;
use super::domain::{Candidate, FieldMatch, ScoredCandidate, SearchItem};
use super::filter::{Field, FieldMatches, FilterError, Predicate, parse_filter_expression};
use super::normalize::{StopWords, normalize, remove_featuring};

/// Default score a field needs to count as a match
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.85;

/// Fields shorter than this only report `contains` when identical
const MIN_CONTAINS_LEN: usize = 5;

/// Relative weight of each field in the overall score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub artist: f64,
    pub title: f64,
    pub album: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            artist: 1.0,
            title: 1.0,
            album: 1.0,
        }
    }
}

impl FieldWeights {
    /// Weights must be finite and non-negative, and artist + title must be
    /// positive so the overall score stays a mean within [0, 1]
    pub fn validate(&self) -> Result<(), String> {
        for (name, weight) in [
            ("artist", self.artist),
            ("title", self.title),
            ("album", self.album),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(format!(
                    "weight for {} must be a non-negative number, got {}",
                    name, weight
                ));
            }
        }
        if self.artist + self.title <= 0.0 {
            return Err("artist and title weights must not both be zero".to_string());
        }
        Ok(())
    }
}

/// Scoring knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Minimum field score for `field:match` (0.0 - 1.0)
    pub match_threshold: f64,
    pub weights: FieldWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            weights: FieldWeights::default(),
        }
    }
}

/// A named match filter tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFilterConfig {
    /// Human readable reason reported with accepted candidates
    pub reason: String,
    /// Filter expression, see [`super::filter`]
    pub expression: String,
}

impl MatchFilterConfig {
    pub fn new(reason: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            expression: expression.into(),
        }
    }
}

/// Default tiers, strictest first
pub fn default_match_filters() -> Vec<MatchFilterConfig> {
    vec![
        MatchFilterConfig::new("Exact artist and title match", "artist:match AND title:match"),
        MatchFilterConfig::new(
            "Exact artist with partial title match",
            "artist:match AND title:contains",
        ),
        MatchFilterConfig::new(
            "Exact artist with similar title (80%+)",
            "artist:match AND title:similarity>=0.8",
        ),
        MatchFilterConfig::new(
            "Partial artist with exact title match",
            "artist:contains AND title:match",
        ),
        MatchFilterConfig::new(
            "Both artist and title very similar (85%+)",
            "artist:similarity>=0.85 AND title:similarity>=0.85",
        ),
        MatchFilterConfig::new(
            "All fields partially match (artist, title, album)",
            "artist:contains AND title:contains AND album:contains",
        ),
        MatchFilterConfig::new(
            "Combined artist-title field very similar (90%+)",
            "artistWithTitle:similarity>=0.9",
        ),
        MatchFilterConfig::new(
            "Album match with good artist and title similarity",
            "artist:similarity>=0.7 AND album:match AND title:similarity>=0.85",
        ),
    ]
}

/// A parsed match filter tier
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub reason: String,
    pub predicate: Predicate,
}

/// Parse every filter, failing on the first invalid expression
pub fn compile_filters(filters: &[MatchFilterConfig]) -> Result<Vec<CompiledFilter>, FilterError> {
    filters
        .iter()
        .map(|f| {
            Ok(CompiledFilter {
                reason: f.reason.clone(),
                predicate: parse_filter_expression(&f.expression)?,
            })
        })
        .collect()
}

/// Scores and ranks candidates against a search item
#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
    stop_words: StopWords,
    filters: Vec<CompiledFilter>,
}

impl Scorer {
    pub fn new(
        config: ScoringConfig,
        text_processing: &TextProcessingConfig,
        filters: &[MatchFilterConfig],
    ) -> Result<Self, FilterError> {
        Ok(Self {
            stop_words: StopWords::new(&text_processing.filter_out_words),
            filters: compile_filters(filters)?,
            config,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Title as it is compared: featuring and stop words removed, normalized
    pub fn comparison_form(&self, text: &str) -> String {
        normalize(&self.stop_words.strip(&remove_featuring(text)))
    }

    /// Artist name as it is compared.
    ///
    /// Featuring clauses are left alone: `Little Feat` is a band, not
    /// `Little` featuring someone.
    pub fn artist_comparison_form(&self, artist: &str) -> String {
        normalize(&self.stop_words.strip(artist))
    }

    /// Compare two titles
    pub fn compare(&self, a: &str, b: &str) -> FieldMatch {
        self.compare_forms(&self.comparison_form(a), &self.comparison_form(b))
    }

    /// Compare two artist names
    pub fn compare_artists(&self, a: &str, b: &str) -> FieldMatch {
        self.compare_forms(
            &self.artist_comparison_form(a),
            &self.artist_comparison_form(b),
        )
    }

    fn compare_forms(&self, a: &str, b: &str) -> FieldMatch {
        if a.is_empty() || b.is_empty() {
            return FieldMatch::default();
        }

        let exact = a == b;
        let score = if exact { 1.0 } else { strsim::sorensen_dice(a, b) };
        let contains = exact
            || (a.chars().count() >= MIN_CONTAINS_LEN
                && b.chars().count() >= MIN_CONTAINS_LEN
                && (contains_words(a, b) || contains_words(b, a)));

        FieldMatch {
            score,
            matched: score >= self.config.match_threshold,
            contains,
            exact,
        }
    }

    /// Score one candidate.
    ///
    /// The artist field uses whichever of the item's artist variations
    /// compares best with the candidate artist.
    pub fn score(&self, item: &SearchItem, candidate: &Candidate) -> ScoredCandidate {
        let variations = item.artist_variations();
        let (artist_name, artist) = variations
            .iter()
            .map(|a| (a.as_str(), self.compare_artists(&candidate.artist, a)))
            .fold(("", FieldMatch::default()), |best, next| {
                if next.1.score > best.1.score { next } else { best }
            });
        let artist_name = if artist_name.is_empty() {
            item.primary_artist()
        } else {
            artist_name
        };

        let title = self.compare(&candidate.title, &item.title);
        let album = match (&candidate.album, &item.album) {
            (Some(a), Some(b)) if !a.trim().is_empty() && !b.trim().is_empty() => {
                Some(self.compare(a, b))
            }
            _ => None,
        };
        let candidate_title = self.comparison_form(&candidate.title);
        let artist_form = self.artist_comparison_form(artist_name);
        let artist_with_title = self.compare_forms(
            &candidate_title,
            &normalize(&format!("{} {}", artist_form, self.comparison_form(&item.title))),
        );
        let artist_in_title = self.compare_forms(&candidate_title, &artist_form);

        let weights = &self.config.weights;
        let mut total = weights.artist * artist.score + weights.title * title.score;
        let mut weight_sum = weights.artist + weights.title;
        if let Some(album) = &album {
            total += weights.album * album.score;
            weight_sum += weights.album;
        }
        let overall = if weight_sum > 0.0 { total / weight_sum } else { 0.0 };

        ScoredCandidate {
            candidate: candidate.clone(),
            artist,
            title,
            album,
            artist_with_title,
            artist_in_title,
            overall,
            reason: None,
        }
    }

    /// Score every candidate and sort best first, without filtering
    pub fn score_all(&self, item: &SearchItem, candidates: &[Candidate]) -> Vec<ScoredCandidate> {
        let mut scored: Vec<_> = candidates.iter().map(|c| self.score(item, c)).collect();
        scored.sort_by(compare_ranked);
        scored
    }

    /// Score, filter and rank.
    ///
    /// Returns the candidates accepted by the first filter tier that accepts
    /// any, best first. An empty list means nothing matched.
    pub fn rank(
        &self,
        item: &SearchItem,
        candidates: &[Candidate],
    ) -> Result<Vec<ScoredCandidate>, FilterError> {
        let scored = self.score_all(item, candidates);

        for filter in &self.filters {
            let mut accepted = Vec::new();
            for candidate in &scored {
                if filter.predicate.evaluate(&field_matches(candidate))? {
                    accepted.push(ScoredCandidate {
                        reason: Some(filter.reason.clone()),
                        ..candidate.clone()
                    });
                }
            }
            if !accepted.is_empty() {
                tracing::debug!(
                    reason = %filter.reason,
                    accepted = accepted.len(),
                    "Match filter accepted candidates"
                );
                return Ok(accepted);
            }
        }

        Ok(Vec::new())
    }
}

/// The field map a filter is evaluated against.
///
/// A missing album on either side counts as a non-match.
pub fn field_matches(scored: &ScoredCandidate) -> FieldMatches {
    let mut fields = FieldMatches::new();
    fields.insert(Field::Artist, scored.artist);
    fields.insert(Field::Title, scored.title);
    fields.insert(Field::Album, scored.album.unwrap_or_default());
    fields.insert(Field::ArtistWithTitle, scored.artist_with_title);
    fields.insert(Field::ArtistInTitle, scored.artist_in_title);
    fields
}

/// Total order on ranked candidates.
///
/// Overall score desc, popularity desc, year desc, then id and key asc.
pub fn compare_ranked(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    let popularity = |c: &ScoredCandidate| c.candidate.popularity.unwrap_or(f64::NEG_INFINITY);
    let year = |c: &ScoredCandidate| c.candidate.year.unwrap_or(i32::MIN);

    b.overall
        .total_cmp(&a.overall)
        .then_with(|| popularity(b).total_cmp(&popularity(a)))
        .then_with(|| year(b).cmp(&year(a)))
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
        .then_with(|| a.candidate.key.cmp(&b.candidate.key))
}

/// `haystack` contains `needle` as a run of whole words
fn contains_words(haystack: &str, needle: &str) -> bool {
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> Scorer {
        Scorer::new(
            ScoringConfig::default(),
            &TextProcessingConfig::default(),
            &default_match_filters(),
        )
        .unwrap()
    }

    #[test]
    fn test_default_filters_compile() {
        assert_eq!(compile_filters(&default_match_filters()).unwrap().len(), 8);
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let filters = vec![MatchFilterConfig::new("bad", "genre:match")];
        let err = Scorer::new(ScoringConfig::default(), &TextProcessingConfig::default(), &filters)
            .unwrap_err();
        assert!(matches!(err, FilterError::Parse { .. }));
    }

    #[test]
    fn test_compare_exact_after_normalization() {
        let m = scorer().compare("Björk", "bjork");
        assert!(m.exact && m.matched);
        assert_eq!(m.score, 1.0);
    }

    #[test]
    fn test_compare_ignores_stop_words_and_featuring() {
        let s = scorer();
        assert!(s.compare("Yesterday (Remastered)", "Yesterday").exact);
        assert!(s.compare("Get Lucky (feat. Pharrell Williams)", "Get Lucky").exact);
    }

    #[test]
    fn test_artist_names_keep_feat() {
        let s = scorer();
        let m = s.compare_artists("Little", "Little Feat");
        assert!(!m.exact && !m.matched);
        assert!(s.compare_artists("Little Feat", "little feat").exact);

        let item = SearchItem::new("1", "Dixie Chicken", "Little Feat");
        let impostor = Candidate::track("10", "Dixie Chicken", "Little");
        assert!(!s.score(&item, &impostor).artist.matched);
        let ranked = s.rank(&item, &[impostor]).unwrap();
        assert!(
            ranked
                .iter()
                .all(|r| r.reason.as_deref() != Some("Exact artist and title match"))
        );

        let genuine = Candidate::track("11", "Dixie Chicken", "Little Feat");
        let ranked = s.rank(&item, &[genuine]).unwrap();
        assert_eq!(ranked[0].reason.as_deref(), Some("Exact artist and title match"));
    }

    #[test]
    fn test_compare_is_monotonic_with_closeness() {
        let s = scorer();
        let close = s.compare("Bohemian Rhapsody", "Bohemian Rapsody").score;
        let far = s.compare("Bohemian Rhapsody", "Killer Queen").score;
        assert!(close > far);
        assert!(close < 1.0);
    }

    #[test]
    fn test_compare_contains_whole_words() {
        let s = scorer();
        assert!(s.compare("Yesterday Live at the BBC", "Yesterday").contains);
        // Too short to count
        assert!(!s.compare("Help Me", "Help").contains);
        // Partial word is not containment
        assert!(!s.compare("Yesterdays", "Yesterday").contains);
    }

    #[test]
    fn test_compare_empty_is_zero() {
        let m = scorer().compare("", "Something");
        assert_eq!(m, FieldMatch::default());
    }

    #[test]
    fn test_overall_includes_album_only_when_both_present() {
        let s = scorer();
        let item = SearchItem::new("1", "Yesterday", "The Beatles");
        let candidate = Candidate::track("10", "Yesterday", "The Beatles").with_album("Help!");
        let scored = s.score(&item, &candidate);
        assert!(scored.album.is_none());
        assert_eq!(scored.overall, 1.0);

        let item = item.with_album("Abbey Road");
        let scored = s.score(&item, &candidate);
        assert!(scored.album.is_some());
        assert!(scored.overall < 1.0);
    }

    #[test]
    fn test_score_uses_best_artist_variation() {
        let s = scorer();
        let item = SearchItem {
            artists: vec!["Pharrell Williams".into(), "Daft Punk".into()],
            ..SearchItem::new("1", "Get Lucky", "")
        };
        let candidate = Candidate::track("10", "Get Lucky", "Daft Punk");
        assert!(s.score(&item, &candidate).artist.exact);
    }

    #[test]
    fn test_rank_yesterday_remastered() {
        let item = SearchItem::new("sp-1", "Yesterday", "The Beatles");
        let candidates = vec![
            Candidate::track("1", "Let It Be", "The Beatles"),
            Candidate::track("2", "Yesterday (Remastered)", "The Beatles"),
            Candidate::track("3", "Yesterday", "Ray Charles"),
        ];
        let s = Scorer::new(
            ScoringConfig::default(),
            &TextProcessingConfig::default(),
            &[MatchFilterConfig::new("exact", "artist:match AND title:match")],
        )
        .unwrap();

        let ranked = s.rank(&item, &candidates).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate.id, "2");
        assert!(ranked[0].overall >= DEFAULT_MATCH_THRESHOLD);
        assert_eq!(ranked[0].reason.as_deref(), Some("exact"));
    }

    #[test]
    fn test_rank_falls_through_tiers() {
        let item = SearchItem::new("sp-1", "Yesterday", "The Beatles");
        let candidates = vec![Candidate::track("1", "Yesterday Live at the BBC", "The Beatles")];
        let ranked = scorer().rank(&item, &candidates).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(
            ranked[0].reason.as_deref(),
            Some("Exact artist with partial title match")
        );
    }

    #[test]
    fn test_rank_nothing_matches() {
        let item = SearchItem::new("sp-1", "Yesterday", "The Beatles");
        let candidates = vec![Candidate::track("1", "Smells Like Teen Spirit", "Nirvana")];
        assert!(scorer().rank(&item, &candidates).unwrap().is_empty());
    }

    #[test]
    fn test_tie_break_popularity_then_id() {
        let item = SearchItem::new("sp-1", "Yesterday", "The Beatles");
        let mut popular = Candidate::track("b", "Yesterday", "The Beatles");
        popular.popularity = Some(10.0);
        let plain_a = Candidate::track("a", "Yesterday", "The Beatles");
        let plain_c = Candidate::track("c", "Yesterday", "The Beatles");

        let ranked = scorer()
            .rank(&item, &[plain_c, popular, plain_a])
            .unwrap();
        let ids: Vec<_> = ranked.iter().map(|r| r.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_tie_break_recency() {
        let item = SearchItem::new("sp-1", "Yesterday", "The Beatles");
        let mut old = Candidate::track("a", "Yesterday", "The Beatles");
        old.year = Some(1965);
        let mut new = Candidate::track("b", "Yesterday", "The Beatles");
        new.year = Some(2009);

        let ranked = scorer().rank(&item, &[old, new]).unwrap();
        assert_eq!(ranked[0].candidate.id, "b");
    }

    #[test]
    fn test_zero_weights_do_not_divide_by_zero() {
        let config = ScoringConfig {
            weights: FieldWeights {
                artist: 0.0,
                title: 0.0,
                album: 0.0,
            },
            ..Default::default()
        };
        let s = Scorer::new(config, &TextProcessingConfig::default(), &[]).unwrap();
        let scored = s.score(
            &SearchItem::new("1", "A Song", "Artist"),
            &Candidate::track("1", "A Song", "Artist"),
        );
        assert_eq!(scored.overall, 0.0);
    }
}
