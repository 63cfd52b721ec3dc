//! Plex API Data Transfer Objects
//!
//! These types match what the Plex Media Server JSON API returns.
//! DO NOT use these types outside the plex module - convert to domain types.

use serde::{Deserialize, Serialize};

/// Envelope every Plex JSON response is wrapped in
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Response {
    #[serde(rename = "MediaContainer")]
    pub media_container: MediaContainer,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MediaContainer {
    /// Present on `/hubs/search`
    #[serde(rename = "Hub", default)]
    pub hubs: Vec<Hub>,
    /// Present on metadata/children lookups
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<Metadata>,
}

/// A group of search results of one type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Hub {
    /// `track`, `album`, `artist`, ...
    #[serde(rename = "type")]
    pub hub_type: String,
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<Metadata>,
}

/// One library item
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub rating_key: String,
    pub key: String,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub guid: Option<String>,
    pub title: String,
    /// Album title for tracks, artist for albums
    pub parent_title: Option<String>,
    /// Artist for tracks
    pub grandparent_title: Option<String>,
    /// Track-level artist when it differs from the album artist
    pub original_title: Option<String>,
    /// Duration in milliseconds
    pub duration: Option<u64>,
    pub year: Option<i32>,
    pub parent_year: Option<i32>,
    /// Search relevance; Plex sends this as a string (`"0.72500"`)
    pub score: Option<serde_json::Value>,
}
