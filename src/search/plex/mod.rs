//! Plex Media Server integration
//!
//! Implements [`crate::search::CatalogClient`] on top of the Plex hub search
//! endpoint and metadata children lookups.
//!
//! Endpoints used:
//! - `GET /hubs/search?query=...&limit=...` - tracks and albums matching free text
//! - `GET {key}` - children of an item (album key -> album tracks)

pub mod dto;
mod adapter;
mod client;

pub use adapter::{to_candidates, to_children};
pub use client::{DEFAULT_HUB_LIMIT, PlexClient};
