//! Album search.
//!
//! Locates an album once, then matches every requested track against the
//! album's track list instead of searching for each track separately.

use tokio_util::sync::CancellationToken;

use super::domain::{
    Candidate, CandidateKind, FieldMatch, QueryRecord, ScoredCandidate, SearchError, SearchItem,
    SearchReport,
};
use super::runner::SearchRunner;

/// Artist similarity that is good enough next to a matching album title
const ALBUM_ARTIST_SIMILARITY: f64 = 0.6;

struct AlbumHit {
    album: Candidate,
    title: FieldMatch,
    artist: FieldMatch,
}

impl AlbumHit {
    fn acceptable(&self) -> bool {
        self.title.matched
            && (self.artist.matched
                || self.artist.score >= ALBUM_ARTIST_SIMILARITY
                || self.artist.contains)
    }

    fn combined(&self) -> f64 {
        self.title.score + self.artist.score
    }
}

impl SearchRunner {
    /// Match a list of tracks from one album.
    ///
    /// The first track with an album name decides which album is searched.
    /// Returns one report per input track, in input order; tracks that do
    /// not appear on the album get an empty result.
    pub async fn search_album(
        &self,
        tracks: &[SearchItem],
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchReport>, SearchError> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let Some((album, artists)) = tracks.iter().find_map(|t| {
            t.album
                .as_deref()
                .filter(|a| !a.trim().is_empty())
                .map(|a| (a, t.artist_variations()))
        }) else {
            return Ok(tracks.iter().map(SearchReport::empty).collect());
        };

        for artist in &artists {
            let Some(found) = self.find_album(album, artist, cancel).await? else {
                continue;
            };

            let album_tracks = match self
                .guarded(cancel, self.client().get_metadata(&found.key))
                .await?
            {
                Ok(album_tracks) => album_tracks,
                Err(err) => {
                    tracing::warn!(album, error = %err, "Could not load album tracks");
                    continue;
                }
            };

            tracing::info!(
                album = %found.title,
                artist = %found.artist,
                tracks = album_tracks.len(),
                "Album found"
            );

            return tracks
                .iter()
                .map(|item| self.match_album_track(item, &found, &album_tracks))
                .collect();
        }

        tracing::info!(album, "Album not found");
        Ok(tracks.iter().map(SearchReport::empty).collect())
    }

    /// Best album hit for `album` by `artist`, if any is acceptable
    async fn find_album(
        &self,
        album: &str,
        artist: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Candidate>, SearchError> {
        let hits = match self.guarded(cancel, self.client().search(album)).await? {
            Ok(hits) => hits,
            Err(err) => {
                tracing::warn!(album, artist, error = %err, "Album search failed");
                return Ok(None);
            }
        };

        let mut found: Vec<AlbumHit> = hits
            .into_iter()
            .filter(|c| c.kind == CandidateKind::Album)
            .map(|c| AlbumHit {
                title: self.scorer.compare(&c.title, album),
                artist: self.scorer.compare_artists(&c.artist, artist),
                album: c,
            })
            .filter(AlbumHit::acceptable)
            .collect();

        found.sort_by(|a, b| {
            b.combined()
                .total_cmp(&a.combined())
                .then_with(|| a.album.id.cmp(&b.album.id))
        });

        Ok(found.into_iter().next().map(|hit| hit.album))
    }

    fn match_album_track(
        &self,
        item: &SearchItem,
        album: &Candidate,
        album_tracks: &[Candidate],
    ) -> Result<SearchReport, SearchError> {
        let mut report = SearchReport::empty(item);
        report.album = album.title.clone();

        let mut results: Vec<ScoredCandidate> = Vec::new();
        for artist in item.artist_variations() {
            let single = SearchItem {
                artists: vec![artist],
                ..item.clone()
            };
            results = self.scorer.rank(&single, album_tracks)?;
            if !results.is_empty() {
                break;
            }
        }

        report.queries.push(QueryRecord {
            approach: "album".to_string(),
            artist: report.artist.clone(),
            title: item.title.clone(),
            album: album.title.clone(),
            candidates: album_tracks.len(),
            accepted: results.len(),
            cached: false,
            error: None,
        });
        report.results = results;
        Ok(report)
    }
}
