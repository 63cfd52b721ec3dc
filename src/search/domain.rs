//! Internal domain models for catalog matching.
//!
//! These types are OUR types - they don't change when the Plex API changes.
//! Hub search responses get converted into [`Candidate`] via the Plex adapter.

use serde::{Deserialize, Serialize};

use super::filter::FilterError;

/// The query descriptor coming from the source service (Spotify, Tidal, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Source-side identifier, echoed back in reports
    pub id: String,
    /// Track (or album) title
    pub title: String,
    /// Credited artists, primary artist first
    pub artists: Vec<String>,
    /// Album title, when known
    #[serde(default)]
    pub album: Option<String>,
    /// Duration in milliseconds, when known
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl SearchItem {
    /// Create an item with a single artist and no album
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artists: vec![artist.into()],
            album: None,
            duration_ms: None,
        }
    }

    /// Builder-style album setter
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Primary artist, or empty string if none was credited
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or("")
    }

    /// Artist names to try when searching.
    ///
    /// Every credited artist on its own, followed by all of them joined
    /// with `", "` when there is more than one. Empty names are skipped.
    pub fn artist_variations(&self) -> Vec<String> {
        let mut variations: Vec<String> = self
            .artists
            .iter()
            .filter(|a| !a.trim().is_empty())
            .cloned()
            .collect();
        if variations.len() > 1 {
            variations.push(variations.join(", "));
        }
        variations
    }
}

/// Kind of item returned by a catalog search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Track,
    Album,
    Artist,
}

/// One item returned by the external catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Catalog-native identifier (Plex ratingKey)
    pub id: String,
    /// Key used for metadata lookups (Plex `key`, e.g. `/library/metadata/1/children`)
    pub key: String,
    pub kind: CandidateKind,
    pub title: String,
    /// Artist (track artist, or album artist for albums)
    pub artist: String,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
    /// Catalog relevance/popularity, higher is better
    pub popularity: Option<f64>,
    /// Release year, used as a recency tie-break
    pub year: Option<i32>,
}

impl Candidate {
    /// Create a track candidate with the minimal fields set
    pub fn track(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            key: format!("/library/metadata/{}", id),
            id,
            kind: CandidateKind::Track,
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_ms: None,
            popularity: None,
            year: None,
        }
    }

    /// Builder-style album setter
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Deduplication key across multiple hub searches
    pub fn dedup_key(&self) -> (CandidateKind, &str) {
        (self.kind, self.id.as_str())
    }
}

/// Outcome of comparing one field of the search item with a candidate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FieldMatch {
    /// Similarity in [0, 1]
    pub score: f64,
    /// `score` cleared the match threshold
    pub matched: bool,
    /// One side contains the other as whole words
    pub contains: bool,
    /// Comparison forms are identical
    pub exact: bool,
}

impl FieldMatch {
    /// A field match derived from a bare boolean, for callers without scores
    pub fn from_flag(matched: bool) -> Self {
        Self {
            score: if matched { 1.0 } else { 0.0 },
            matched,
            contains: matched,
            exact: matched,
        }
    }
}

/// A candidate with its per-field comparison and overall score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub artist: FieldMatch,
    pub title: FieldMatch,
    /// `None` when either side has no album
    pub album: Option<FieldMatch>,
    pub artist_with_title: FieldMatch,
    pub artist_in_title: FieldMatch,
    /// Weighted combination of artist/title/album scores
    pub overall: f64,
    /// Reason of the match filter tier that accepted this candidate
    pub reason: Option<String>,
}

/// One query issued to the catalog, kept for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    /// Approach id, suffixed with `-and` for the `&` rewrite retry
    pub approach: String,
    pub artist: String,
    pub title: String,
    pub album: String,
    /// Number of candidates the catalog returned
    pub candidates: usize,
    /// Number of candidates that survived the match filters
    pub accepted: usize,
    /// Served from the session cache
    pub cached: bool,
    /// Transport failure for this query, if any
    pub error: Option<String>,
}

/// Whether a search produced an accepted match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    Matched,
    NotFound,
}

/// Full result of a search for one item
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub id: String,
    pub artist: String,
    pub title: String,
    pub album: String,
    /// Every query examined, in order
    pub queries: Vec<QueryRecord>,
    /// Accepted candidates, best first
    pub results: Vec<ScoredCandidate>,
}

impl SearchReport {
    /// An empty report for `item`
    pub fn empty(item: &SearchItem) -> Self {
        Self {
            id: item.id.clone(),
            artist: item.primary_artist().to_string(),
            title: item.title.clone(),
            album: item.album.clone().unwrap_or_default(),
            queries: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn outcome(&self) -> SearchOutcome {
        if self.results.is_empty() {
            SearchOutcome::NotFound
        } else {
            SearchOutcome::Matched
        }
    }

    /// Best match, if any
    pub fn best(&self) -> Option<&ScoredCandidate> {
        self.results.first()
    }
}

/// Errors from a catalog client call
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Unauthorized - check the Plex token")]
    Unauthorized,

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Errors that abort a search
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search cancelled")]
    Cancelled,

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Invalid search configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_variations_single() {
        let item = SearchItem::new("1", "Yesterday", "The Beatles");
        assert_eq!(item.artist_variations(), vec!["The Beatles".to_string()]);
    }

    #[test]
    fn test_artist_variations_multiple_adds_joined() {
        let item = SearchItem {
            artists: vec!["Daft Punk".into(), "".into(), "Pharrell Williams".into()],
            ..SearchItem::new("1", "Get Lucky", "")
        };
        assert_eq!(
            item.artist_variations(),
            vec![
                "Daft Punk".to_string(),
                "Pharrell Williams".to_string(),
                "Daft Punk, Pharrell Williams".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_report_is_not_found() {
        let item = SearchItem::new("1", "Song", "Artist").with_album("Album");
        let report = SearchReport::empty(&item);
        assert_eq!(report.outcome(), SearchOutcome::NotFound);
        assert_eq!(report.album, "Album");
        assert!(report.best().is_none());
    }

    #[test]
    fn test_field_match_from_flag() {
        let m = FieldMatch::from_flag(true);
        assert!(m.matched && m.contains && m.exact);
        assert_eq!(m.score, 1.0);
        assert!(!FieldMatch::from_flag(false).matched);
    }
}
