//! Track and album search commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::config::{Settings, SettingsStore};
use crate::error::{self, Error, ResultExt};
use crate::search::plex::PlexClient;
use crate::search::{SearchApproachConfig, SearchError, SearchItem, SearchReport, SearchRunner};
use crate::sync_log::{JsonLinesSyncLog, SyncLogSink};

use super::PlexArgs;

/// Where the items to search come from
pub struct ItemInput {
    pub title: Option<String>,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub items: Option<PathBuf>,
}

impl ItemInput {
    fn into_items(self) -> error::Result<Vec<SearchItem>> {
        if let Some(path) = &self.items {
            return load_items(path);
        }
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::invalid("a title is required"))?;
        Ok(vec![SearchItem {
            id: "cli".to_string(),
            title,
            artists: self.artists,
            album: self.album,
            duration_ms: None,
        }])
    }
}

/// Flags for `search`
pub struct SearchOptions {
    pub approaches: Vec<String>,
    pub analyze: bool,
    pub concurrency: usize,
    pub json: bool,
    pub sync_log: Option<PathBuf>,
}

/// Read a JSON array of search items
fn load_items(path: &Path) -> error::Result<Vec<SearchItem>> {
    if !path.exists() {
        return Err(Error::not_found(path));
    }
    let text = std::fs::read_to_string(path).with_context(format!("reading {}", path.display()))?;
    let items: Vec<SearchItem> = serde_json::from_str(&text)?;

    if let Some(bad) = items.iter().find(|i| i.title.trim().is_empty()) {
        return Err(Error::invalid(format!("item '{}' has no title", bad.id)));
    }
    Ok(items)
}

/// Configured approaches, restricted to `ids` when any are given
fn select_approaches(
    configured: &[SearchApproachConfig],
    ids: &[String],
) -> anyhow::Result<Vec<SearchApproachConfig>> {
    if ids.is_empty() {
        return Ok(configured.to_vec());
    }
    if let Some(unknown) = ids.iter().find(|id| !configured.iter().any(|a| &a.id == *id)) {
        let known: Vec<_> = configured.iter().map(|a| a.id.as_str()).collect();
        anyhow::bail!("Unknown approach '{}' (configured: {})", unknown, known.join(", "));
    }
    Ok(configured
        .iter()
        .filter(|a| ids.contains(&a.id))
        .cloned()
        .collect())
}

/// Build a runner against the configured (or overridden) Plex server
fn build_runner(config: Option<PathBuf>, plex: &PlexArgs) -> anyhow::Result<(SearchRunner, Arc<Settings>)> {
    let store = SettingsStore::open(config);
    let settings = store.snapshot();

    let uri = plex.uri.clone().unwrap_or_else(|| settings.plex.uri.clone());
    let token = plex.token.clone().unwrap_or_else(|| settings.plex.token.clone());
    if uri.trim().is_empty() || token.trim().is_empty() {
        eprintln!("Error: No Plex connection configured.");
        eprintln!("Use --uri and --token, set PLEX_URI / PLEX_TOKEN,");
        match store.path() {
            Some(path) => eprintln!("or fill in the [plex] section of {:?}", path),
            None => eprintln!("or fill in the [plex] section of the config file"),
        }
        anyhow::bail!("missing Plex connection");
    }

    let client = PlexClient::new(&uri, &token, Some(settings.search.max_results))?;
    let runner = SearchRunner::new(Arc::new(client), &settings.search)?;
    Ok((runner, settings))
}

/// Cancel the returned token when Ctrl-C is pressed
fn cancel_on_ctrl_c(rt: &Runtime) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling search");
            trigger.cancel();
        }
    });
    token
}

/// Search for one item or a file of items
pub fn cmd_search(
    rt: &Runtime,
    config: Option<PathBuf>,
    plex: &PlexArgs,
    input: ItemInput,
    options: &SearchOptions,
) -> anyhow::Result<()> {
    let items = input.into_items()?;
    let (runner, settings) = build_runner(config, plex)?;
    let runner = runner.with_analyze(options.analyze);
    let approaches = select_approaches(&settings.search.approaches, &options.approaches)?;
    let sink = options.sync_log.clone().map(JsonLinesSyncLog::new);
    let cancel = cancel_on_ctrl_c(rt);

    let results: Vec<Result<SearchReport, SearchError>> = rt.block_on(async {
        futures::stream::iter(items.iter())
            .map(|item| runner.run(item, &approaches, &cancel))
            .buffered(options.concurrency.max(1))
            .collect()
            .await
    });

    let mut reports = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(SearchError::Cancelled) => {
                eprintln!("✗ Search cancelled");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(sink) = &sink {
        for report in &reports {
            sink.append(&report.to_sync_entry())?;
        }
        tracing::info!(path = ?sink.path(), entries = reports.len(), "Sync log written");
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report, options.analyze);
        }
        if items.len() > 1 {
            let matched = reports.iter().filter(|r| !r.results.is_empty()).count();
            println!();
            println!("Matched {} of {} items", matched, items.len());
        }
    }

    if cancel.is_cancelled() {
        anyhow::bail!("search cancelled");
    }
    Ok(())
}

/// Match the tracks of one album
#[allow(clippy::too_many_arguments)]
pub fn cmd_album(
    rt: &Runtime,
    config: Option<PathBuf>,
    plex: &PlexArgs,
    album: Option<&str>,
    artists: &[String],
    tracks: &[String],
    items: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let items = match items {
        Some(path) => load_items(path)?,
        None => {
            if tracks.is_empty() {
                anyhow::bail!("Give at least one --track to match");
            }
            tracks
                .iter()
                .enumerate()
                .map(|(i, title)| SearchItem {
                    id: (i + 1).to_string(),
                    title: title.clone(),
                    artists: artists.to_vec(),
                    album: album.map(str::to_string),
                    duration_ms: None,
                })
                .collect()
        }
    };

    let (runner, _) = build_runner(config, plex)?;
    let cancel = cancel_on_ctrl_c(rt);
    let reports = rt.block_on(runner.search_album(&items, &cancel))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        if let Some(first) = reports.first() {
            println!("Album: {}", first.album);
            println!();
        }
        for report in &reports {
            print_report(report, false);
        }
    }
    Ok(())
}

fn print_report(report: &SearchReport, show_queries: bool) {
    match report.best() {
        Some(best) => {
            println!("✓ {} - {}", report.artist, report.title);
            let c = &best.candidate;
            print!("    → {} - {}", c.artist, c.title);
            if let Some(album) = &c.album {
                print!(" ({})", album);
            }
            println!(
                " [{:.0}%, {}]",
                best.overall * 100.0,
                best.reason.as_deref().unwrap_or("matched")
            );
            println!("      key: {}", c.key);
        }
        None => println!("✗ {} - {}: not found", report.artist, report.title),
    }

    if show_queries {
        for q in &report.queries {
            let status = match &q.error {
                Some(e) => format!("error: {}", e),
                None => format!("{} candidates, {} accepted", q.candidates, q.accepted),
            };
            println!(
                "      [{}] {} | {}{} → {}",
                q.approach,
                q.artist,
                q.title,
                if q.cached { " (cached)" } else { "" },
                status
            );
        }
    }
}
