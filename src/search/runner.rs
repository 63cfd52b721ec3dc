//! Search approach runner.
//!
//! Runs the configured approaches in order against a [`CatalogClient`].
//! For each approach and artist variation the item's artist, title and album
//! are turned into a query triple with [`prepare_query`]; the catalog is
//! searched for that triple and the results are scored against the triple.
//!
//! The first approach that produces an accepted candidate wins. In analyze
//! mode every approach runs and every query is recorded, but the first
//! accepted result set stays authoritative.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::approach::{SearchApproachConfig, TextProcessingConfig};
use super::domain::{
    Candidate, CandidateKind, CatalogError, QueryRecord, ScoredCandidate, SearchError, SearchItem,
    SearchReport,
};
use super::normalize::{StopWords, collapse_whitespace, prepare_query};
use super::scoring::Scorer;
use super::traits::CatalogClient;
use crate::config::SearchSettings;

/// One processed query: what is sent to the catalog and scored against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryTriple {
    artist: String,
    title: String,
    album: String,
}

impl QueryTriple {
    fn cache_key(&self) -> String {
        format!("{}|{}|{}", self.artist, self.title, self.album)
    }

    fn has_ampersand(&self) -> bool {
        self.artist.contains('&') || self.title.contains('&')
    }

    /// `&` rewritten to `and` in artist and title
    fn with_and(&self) -> Self {
        let rewrite = |s: &str| collapse_whitespace(&s.replace('&', " and "));
        Self {
            artist: rewrite(&self.artist),
            title: rewrite(&self.title),
            album: self.album.clone(),
        }
    }

    /// The triple as a search item, so it can be scored
    fn as_item(&self, id: &str) -> SearchItem {
        SearchItem {
            id: id.to_string(),
            title: self.title.clone(),
            artists: vec![self.artist.clone()],
            album: (!self.album.is_empty()).then(|| self.album.clone()),
            duration_ms: None,
        }
    }

    /// Free-text searches for this triple, in order, without duplicates.
    ///
    /// `artist title`, then `title`, then `artist`, then whatever follows
    /// a `:` in the title (classical works are often `Composer: Work`).
    fn searches(&self) -> Vec<String> {
        let mut searches = vec![
            collapse_whitespace(&format!("{} {}", self.artist, self.title)),
            self.title.clone(),
            self.artist.clone(),
        ];
        if let Some(idx) = self.title.find(':') {
            searches.push(self.title[idx + 1..].trim().to_string());
        }

        let mut seen = HashSet::new();
        searches.retain(|s| !s.is_empty() && seen.insert(s.clone()));
        searches
    }
}

/// Accepted candidates of one query, and how many the catalog returned
#[derive(Debug, Clone)]
struct QueryResult {
    candidates: usize,
    accepted: Vec<ScoredCandidate>,
}

/// Runs search approaches against a catalog
pub struct SearchRunner {
    client: Arc<dyn CatalogClient>,
    pub(crate) scorer: Scorer,
    text_processing: TextProcessingConfig,
    stop_words: StopWords,
    timeout: Duration,
    analyze: bool,
    cache: Mutex<HashMap<String, QueryResult>>,
}

impl SearchRunner {
    /// Create a runner from validated search settings
    pub fn new(client: Arc<dyn CatalogClient>, settings: &SearchSettings) -> Result<Self, SearchError> {
        settings.validate()?;
        let scorer = Scorer::new(
            settings.scoring.clone(),
            &settings.text_processing,
            &settings.match_filters,
        )?;

        Ok(Self {
            client,
            scorer,
            stop_words: StopWords::new(&settings.text_processing.filter_out_words),
            text_processing: settings.text_processing.clone(),
            timeout: Duration::from_secs(settings.search_timeout_secs.max(1)),
            analyze: false,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Run every approach and record all queries
    pub fn with_analyze(mut self, analyze: bool) -> Self {
        self.analyze = analyze;
        self
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Forget every cached query result
    pub fn reset_cache(&self) {
        self.cache.lock().clear();
    }

    pub(crate) fn client(&self) -> &dyn CatalogClient {
        self.client.as_ref()
    }

    /// Search the catalog for `item`.
    ///
    /// Returns a report with every examined query and the accepted
    /// candidates, best first. Nothing accepted is a `NotFound` report,
    /// not an error; only cancellation aborts the search.
    pub async fn run(
        &self,
        item: &SearchItem,
        approaches: &[SearchApproachConfig],
        cancel: &CancellationToken,
    ) -> Result<SearchReport, SearchError> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let mut report = SearchReport::empty(item);
        let variations = item.artist_variations();

        'approaches: for approach in approaches {
            for artist in &variations {
                let triple = QueryTriple {
                    artist: self.prepare(artist, approach),
                    title: self.prepare(&item.title, approach),
                    album: self.prepare(item.album.as_deref().unwrap_or(""), approach),
                };

                let mut accepted = self
                    .run_query(&item.id, &approach.id, &triple, &mut report, cancel)
                    .await?;

                if accepted.is_empty() && triple.has_ampersand() {
                    let and_id = format!("{}-and", approach.id);
                    accepted = self
                        .run_query(&item.id, &and_id, &triple.with_and(), &mut report, cancel)
                        .await?;
                }

                if accepted.is_empty() {
                    continue;
                }
                if report.results.is_empty() {
                    report.results = accepted;
                }
                if !self.analyze {
                    break 'approaches;
                }
            }
        }

        match report.best() {
            Some(best) => tracing::info!(
                id = %item.id,
                title = %item.title,
                matched = %best.candidate.title,
                reason = best.reason.as_deref().unwrap_or(""),
                queries = report.queries.len(),
                "Match found"
            ),
            None => tracing::info!(
                id = %item.id,
                title = %item.title,
                queries = report.queries.len(),
                "No match found"
            ),
        }

        Ok(report)
    }

    fn prepare(&self, text: &str, approach: &SearchApproachConfig) -> String {
        prepare_query(text, approach, &self.text_processing, &self.stop_words)
    }

    /// Run one query triple, recording it in `report`.
    ///
    /// Transport failures are recorded and yield no candidates.
    async fn run_query(
        &self,
        id: &str,
        approach: &str,
        triple: &QueryTriple,
        report: &mut SearchReport,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredCandidate>, SearchError> {
        let mut record = QueryRecord {
            approach: approach.to_string(),
            artist: triple.artist.clone(),
            title: triple.title.clone(),
            album: triple.album.clone(),
            candidates: 0,
            accepted: 0,
            cached: false,
            error: None,
        };

        let key = triple.cache_key();
        let cached = self.cache.lock().get(&key).cloned();
        let result = match cached {
            Some(result) => {
                record.cached = true;
                Some(result)
            }
            None => match self.fetch_candidates(triple, cancel).await? {
                Ok(candidates) => {
                    let accepted = self.scorer.rank(&triple.as_item(id), &candidates)?;
                    let result = QueryResult {
                        candidates: candidates.len(),
                        accepted,
                    };
                    self.cache.lock().insert(key, result.clone());
                    Some(result)
                }
                Err(err) => {
                    tracing::warn!(
                        approach,
                        artist = %triple.artist,
                        title = %triple.title,
                        error = %err,
                        "Catalog query failed"
                    );
                    record.error = Some(err.to_string());
                    None
                }
            },
        };

        let accepted = match result {
            Some(result) => {
                record.candidates = result.candidates;
                record.accepted = result.accepted.len();
                result.accepted
            }
            None => Vec::new(),
        };

        tracing::debug!(
            approach,
            artist = %record.artist,
            title = %record.title,
            candidates = record.candidates,
            accepted = record.accepted,
            cached = record.cached,
            "Query examined"
        );
        report.queries.push(record);
        Ok(accepted)
    }

    /// Every track the catalog returns for a triple, deduplicated.
    ///
    /// When the first search only finds albums, the first album is expanded
    /// into its tracks. Album hits themselves are never scored.
    async fn fetch_candidates(
        &self,
        triple: &QueryTriple,
        cancel: &CancellationToken,
    ) -> Result<Result<Vec<Candidate>, CatalogError>, SearchError> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for (i, query) in triple.searches().iter().enumerate() {
            let hits = match self.guarded(cancel, self.client.search(query)).await? {
                Ok(hits) => hits,
                Err(err) => return Ok(Err(err)),
            };

            if i == 0
                && !hits.is_empty()
                && hits.iter().all(|c| c.kind == CandidateKind::Album)
            {
                let album = &hits[0];
                let tracks = match self.guarded(cancel, self.client.get_metadata(&album.key)).await? {
                    Ok(tracks) => tracks,
                    Err(err) => return Ok(Err(err)),
                };
                push_unique(&mut candidates, &mut seen, tracks);
            }
            push_unique(&mut candidates, &mut seen, hits);
        }

        candidates.retain(|c| c.kind == CandidateKind::Track);
        Ok(Ok(candidates))
    }

    /// Race a catalog call against cancellation and the per-call timeout
    pub(crate) async fn guarded<T>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T, CatalogError>>,
    ) -> Result<Result<T, CatalogError>, SearchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SearchError::Cancelled),
            result = tokio::time::timeout(self.timeout, call) => {
                Ok(result.unwrap_or(Err(CatalogError::Timeout(self.timeout))))
            }
        }
    }
}

fn push_unique(
    candidates: &mut Vec<Candidate>,
    seen: &mut HashSet<(CandidateKind, String)>,
    hits: Vec<Candidate>,
) {
    for hit in hits {
        if seen.insert((hit.kind, hit.id.clone())) {
            candidates.push(hit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::approach::default_approaches;
    use crate::search::domain::SearchOutcome;
    use crate::search::traits::mocks::{MockCatalog, album};

    fn runner(mock: MockCatalog) -> (Arc<MockCatalog>, SearchRunner) {
        let mock = Arc::new(mock);
        let runner = SearchRunner::new(mock.clone(), &SearchSettings::default()).unwrap();
        (mock, runner)
    }

    fn normal_only() -> Vec<SearchApproachConfig> {
        default_approaches().into_iter().take(1).collect()
    }

    fn beatles() -> MockCatalog {
        MockCatalog::with_tracks(vec![
            Candidate::track("1", "Yesterday", "The Beatles").with_album("Help!"),
            Candidate::track("2", "Help!", "The Beatles").with_album("Help!"),
            Candidate::track("3", "Yesterday Once More", "Carpenters"),
        ])
    }

    #[tokio::test]
    async fn test_remastered_title_matches_plain_track() {
        let (mock, runner) = runner(beatles());
        let item = SearchItem::new("sp1", "Yesterday (Remastered)", "The Beatles");

        let report = runner
            .run(&item, &default_approaches(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome(), SearchOutcome::Matched);
        let best = report.best().unwrap();
        assert_eq!(best.candidate.id, "1");
        assert_eq!(best.reason.as_deref(), Some("Exact artist and title match"));
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.queries.len(), 1);
        assert_eq!(report.queries[0].approach, "normal");
        // Only the first approach's sub-searches reached the catalog
        assert_eq!(mock.search_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_later_approach_used_when_first_finds_nothing() {
        let catalog = || {
            MockCatalog::with_tracks(vec![Candidate::track(
                "7",
                "Galvanize",
                "Chemical Brothers",
            )])
        };
        let item = SearchItem::new(
            "sp2",
            "Galvanize - Glastonbury 2019 Version",
            "The Chemical Brothers",
        );

        let (fast_mock, fast) = runner(catalog());
        let report = fast
            .run(&item, &normal_only(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.outcome(), SearchOutcome::NotFound);
        assert_eq!(fast_mock.search_calls().len(), 3);

        let (thorough_mock, thorough) = runner(catalog());
        let report = thorough
            .run(&item, &default_approaches(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.outcome(), SearchOutcome::Matched);
        assert_eq!(report.best().unwrap().candidate.id, "7");

        let approaches: Vec<_> = report.queries.iter().map(|q| q.approach.as_str()).collect();
        assert_eq!(approaches, vec!["normal", "filtered", "trimmed"]);
        // "filtered" produces the same triple as "normal"
        assert!(report.queries[1].cached);
        assert_eq!(thorough_mock.search_calls().len(), 6);
    }

    #[tokio::test]
    async fn test_transport_error_recorded_and_next_approach_tried() {
        let mut mock = beatles();
        mock.failing_queries
            .insert("the beatles yesterday (remastered)".to_string());
        let (_, runner) = runner(mock);
        let item = SearchItem::new("sp1", "Yesterday (Remastered)", "The Beatles");

        let report = runner
            .run(&item, &default_approaches(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.queries[0].error.as_deref().unwrap().contains("connection reset"));
        assert_eq!(report.queries[1].approach, "filtered");
        assert!(report.queries[1].error.is_none());
        assert_eq!(report.outcome(), SearchOutcome::Matched);
    }

    #[tokio::test]
    async fn test_ampersand_rewritten_to_and() {
        let (mock, runner) = runner(MockCatalog::with_tracks(vec![Candidate::track(
            "9",
            "Rock and Roll",
            "Led Zeppelin",
        )]));
        let item = SearchItem::new("sp3", "Rock & Roll", "Led Zeppelin");

        let report = runner
            .run(&item, &normal_only(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.queries.len(), 2);
        assert_eq!(report.queries[0].accepted, 0);
        assert_eq!(report.queries[1].approach, "normal-and");
        assert_eq!(report.queries[1].title, "rock and roll");
        assert_eq!(report.best().unwrap().candidate.id, "9");
        assert!(mock.search_calls().contains(&"led zeppelin rock and roll".to_string()));
    }

    #[tokio::test]
    async fn test_colon_suffix_searched() {
        let (mock, runner) = runner(MockCatalog::default());
        let item = SearchItem::new("sp4", "Goldberg Variations: Aria", "Glenn Gould");

        let report = runner
            .run(&item, &normal_only(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome(), SearchOutcome::NotFound);
        assert_eq!(
            mock.search_calls(),
            vec![
                "glenn gould goldberg variations: aria".to_string(),
                "goldberg variations: aria".to_string(),
                "glenn gould".to_string(),
                "aria".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_album_only_hits_expanded() {
        let mut mock = MockCatalog::default();
        mock.add_album(
            album("100", "Help!", "The Beatles"),
            vec![Candidate::track("101", "Help!", "The Beatles").with_album("Help!")],
        );
        let (mock, runner) = runner(mock);
        let item = SearchItem::new("sp5", "Help!", "The Beatles");

        let report = runner
            .run(&item, &normal_only(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(mock.metadata_calls(), vec!["/library/metadata/100/children".to_string()]);
        assert_eq!(report.best().unwrap().candidate.id, "101");
        assert!(report.results.iter().all(|r| r.candidate.kind == CandidateKind::Track));
    }

    #[tokio::test]
    async fn test_cache_reused_until_reset() {
        let (mock, runner) = runner(beatles());
        let item = SearchItem::new("sp1", "Yesterday", "The Beatles");
        let cancel = CancellationToken::new();

        runner.run(&item, &normal_only(), &cancel).await.unwrap();
        let calls = mock.search_calls().len();

        let report = runner.run(&item, &normal_only(), &cancel).await.unwrap();
        assert!(report.queries[0].cached);
        assert_eq!(report.outcome(), SearchOutcome::Matched);
        assert_eq!(mock.search_calls().len(), calls);

        runner.reset_cache();
        runner.run(&item, &normal_only(), &cancel).await.unwrap();
        assert_eq!(mock.search_calls().len(), calls * 2);
    }

    #[tokio::test]
    async fn test_analyze_runs_every_approach() {
        let (mock, runner) = runner(beatles());
        let runner = runner.with_analyze(true);
        let item = SearchItem::new("sp1", "Yesterday", "The Beatles");

        let report = runner
            .run(&item, &default_approaches(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.queries.len(), 4);
        assert!(report.queries[1..].iter().all(|q| q.cached));
        assert_eq!(report.best().unwrap().candidate.id, "1");
        // Every approach yields the same triple, so only the first hits the catalog
        assert_eq!(mock.search_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_no_approaches_is_not_found() {
        let (mock, runner) = runner(beatles());
        let item = SearchItem::new("sp1", "Yesterday", "The Beatles");

        let report = runner.run(&item, &[], &CancellationToken::new()).await.unwrap();

        assert_eq!(report.outcome(), SearchOutcome::NotFound);
        assert!(report.queries.is_empty());
        assert!(mock.search_calls().is_empty());
    }

    #[tokio::test]
    async fn test_item_without_artists_is_not_found() {
        let (mock, runner) = runner(beatles());
        let item = SearchItem {
            artists: vec![],
            ..SearchItem::new("sp1", "Yesterday", "")
        };

        let report = runner
            .run(&item, &default_approaches(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome(), SearchOutcome::NotFound);
        assert!(mock.search_calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (mock, runner) = runner(beatles());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = runner
            .run(&SearchItem::new("sp1", "Yesterday", "The Beatles"), &default_approaches(), &cancel)
            .await;

        assert!(matches!(result, Err(SearchError::Cancelled)));
        assert!(mock.search_calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_during_call() {
        let mut mock = beatles();
        mock.delay = Some(Duration::from_secs(30));
        let (_, runner) = runner(mock);
        let runner = runner.with_timeout(Duration::from_secs(60));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = runner
            .run(&SearchItem::new("sp1", "Yesterday", "The Beatles"), &default_approaches(), &cancel)
            .await;

        assert!(matches!(result, Err(SearchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_timeout_recorded_as_query_error() {
        let mut mock = beatles();
        mock.delay = Some(Duration::from_millis(500));
        let (_, runner) = runner(mock);
        let runner = runner.with_timeout(Duration::from_millis(10));

        let report = runner
            .run(
                &SearchItem::new("sp1", "Yesterday", "The Beatles"),
                &normal_only(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.outcome(), SearchOutcome::NotFound);
        assert!(report.queries[0].error.as_deref().unwrap().contains("timed out"));
    }

    #[test]
    fn test_triple_searches_dedup() {
        let triple = QueryTriple {
            artist: String::new(),
            title: "intro".to_string(),
            album: String::new(),
        };
        assert_eq!(triple.searches(), vec!["intro".to_string()]);
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let mut settings = SearchSettings::default();
        settings.match_filters[0].expression = "artist:sounds-like".to_string();
        let result = SearchRunner::new(Arc::new(MockCatalog::default()), &settings);
        assert!(matches!(result, Err(SearchError::Filter(_))));
    }
}
