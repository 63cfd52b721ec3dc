//! Trait definitions for the external catalog.
//!
//! The search engine only talks to the catalog through [`CatalogClient`].
//! Production code uses [`super::plex::PlexClient`], while tests substitute
//! the mock in [`mocks`].

use async_trait::async_trait;

use super::domain::{Candidate, CatalogError};

/// A searchable music catalog (a Plex library section, for example).
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Free-text search returning tracks and albums.
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, CatalogError>;

    /// Children of a catalog item, e.g. the tracks of an album.
    async fn get_metadata(&self, key: &str) -> Result<Vec<Candidate>, CatalogError>;
}

#[async_trait]
impl CatalogClient for super::plex::PlexClient {
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, CatalogError> {
        self.hub_search(query).await
    }

    async fn get_metadata(&self, key: &str) -> Result<Vec<Candidate>, CatalogError> {
        self.children(key).await
    }
}
