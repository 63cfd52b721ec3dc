//! Adapter layer: Convert Plex DTOs to domain models
//!
//! This is the ONLY place where Plex DTO types are converted to domain types.

use super::dto;
use crate::search::domain::{Candidate, CandidateKind};

/// Convert a hub search response into candidates.
///
/// Only track and album hubs are kept; other hub types (artists, playlists,
/// episodes, ...) carry nothing the matcher can use.
pub fn to_candidates(response: dto::Response) -> Vec<Candidate> {
    response
        .media_container
        .hubs
        .into_iter()
        .filter_map(|hub| {
            let kind = parse_kind(&hub.hub_type)?;
            Some(
                hub.metadata
                    .into_iter()
                    .map(move |m| to_candidate(m, kind))
                    .collect::<Vec<_>>(),
            )
        })
        .flatten()
        .filter(|c| c.kind != CandidateKind::Artist)
        .collect()
}

/// Convert a metadata children response (album tracks) into candidates
pub fn to_children(response: dto::Response) -> Vec<Candidate> {
    response
        .media_container
        .metadata
        .into_iter()
        .map(|m| {
            let kind = m
                .item_type
                .as_deref()
                .and_then(parse_kind)
                .unwrap_or(CandidateKind::Track);
            to_candidate(m, kind)
        })
        .collect()
}

fn parse_kind(kind: &str) -> Option<CandidateKind> {
    match kind {
        "track" => Some(CandidateKind::Track),
        "album" => Some(CandidateKind::Album),
        "artist" => Some(CandidateKind::Artist),
        _ => None,
    }
}

fn to_candidate(m: dto::Metadata, kind: CandidateKind) -> Candidate {
    let (artist, album) = match kind {
        // Albums: parentTitle is the album artist
        CandidateKind::Album => (m.parent_title.clone(), Some(m.title.clone())),
        // Tracks: prefer the track artist on compilations
        _ => (
            m.original_title
                .clone()
                .filter(|a| !a.trim().is_empty())
                .or_else(|| m.grandparent_title.clone()),
            m.parent_title.clone(),
        ),
    };

    Candidate {
        id: m.rating_key,
        key: m.key,
        kind,
        title: m.title,
        artist: artist.unwrap_or_default(),
        album,
        duration_ms: m.duration,
        popularity: m.score.as_ref().and_then(parse_score),
        year: m.year.or(m.parent_year),
    }
}

/// Plex sends scores as strings, but tolerate plain numbers too
fn parse_score(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
