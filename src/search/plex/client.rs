//! Plex Media Server HTTP client
//!
//! Talks to the hub search and metadata endpoints.
//! Every request carries the `X-Plex-Token` header and asks for JSON.

use super::{adapter, dto};
use crate::search::domain::{Candidate, CatalogError};

/// Default number of results per hub
pub const DEFAULT_HUB_LIMIT: u32 = 10;

const USER_AGENT: &str = concat!("PlexMusicSearch/", env!("CARGO_PKG_VERSION"));

/// Plex API client
pub struct PlexClient {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
    limit: u32,
}

impl PlexClient {
    /// Create a client for the server at `uri`
    pub fn new(uri: &str, token: &str, limit: Option<u32>) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: uri.trim_end_matches('/').to_string(),
            token: token.to_string(),
            limit: limit.unwrap_or(DEFAULT_HUB_LIMIT).max(1),
        })
    }

    /// Search all hubs for `query`, returning tracks and albums
    pub async fn hub_search(&self, query: &str) -> Result<Vec<Candidate>, CatalogError> {
        let url = self.search_url(query);
        tracing::debug!(target: "plex", query, "hub search");
        let response = self.get_json(&url).await?;
        Ok(adapter::to_candidates(response))
    }

    /// Fetch the children of `key` (tracks of an album)
    pub async fn children(&self, key: &str) -> Result<Vec<Candidate>, CatalogError> {
        let url = self.metadata_url(key);
        tracing::debug!(target: "plex", key, "metadata lookup");
        let response = self.get_json(&url).await?;
        Ok(adapter::to_children(response))
    }

    fn search_url(&self, query: &str) -> String {
        // Plex hub search chokes on parentheses
        let query: String = query.chars().filter(|c| !matches!(c, '(' | ')')).collect();
        format!(
            "{}/hubs/search?query={}&limit={}",
            self.base_url,
            urlencoding::encode(query.trim()),
            self.limit
        )
    }

    fn metadata_url(&self, key: &str) -> String {
        if key.starts_with('/') {
            format!("{}{}", self.base_url, key)
        } else {
            format!("{}/library/metadata/{}/children", self.base_url, key)
        }
    }

    /// Send the HTTP request and parse the response
    async fn get_json(&self, url: &str) -> Result<dto::Response, CatalogError> {
        let response = self
            .http_client
            .get(url)
            .header("X-Plex-Token", &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CatalogError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CatalogError::RateLimited);
        }

        if !status.is_success() {
            return Err(CatalogError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PlexClient {
        PlexClient::new("http://plex.local:32400/", "secret", None).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = client();
        assert_eq!(client.base_url, "http://plex.local:32400");
        assert_eq!(client.limit, DEFAULT_HUB_LIMIT);
    }

    #[test]
    fn test_search_url_strips_parentheses_and_encodes() {
        let url = client().search_url("Yesterday (Remastered) & more");
        assert_eq!(
            url,
            "http://plex.local:32400/hubs/search?query=Yesterday%20Remastered%20%26%20more&limit=10"
        );
    }

    #[test]
    fn test_zero_limit_clamped() {
        let client = PlexClient::new("http://plex.local", "t", Some(0)).unwrap();
        assert_eq!(client.limit, 1);
    }

    #[test]
    fn test_metadata_url() {
        let client = client();
        assert_eq!(
            client.metadata_url("/library/metadata/55/children"),
            "http://plex.local:32400/library/metadata/55/children"
        );
        assert_eq!(
            client.metadata_url("55"),
            "http://plex.local:32400/library/metadata/55/children"
        );
    }

    #[test]
    fn test_user_agent_format() {
        assert!(USER_AGENT.starts_with("PlexMusicSearch/"));
    }
}
