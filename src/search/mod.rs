//! Catalog search and matching.
//!
//! This module locates the catalog item that best matches a track or album
//! from a streaming service.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                     SearchRunner                       │
//! │  approaches → query triples → catalog → score & filter │
//! └────────────────────────────────────────────────────────┘
//!          │                  │                  │
//!          ▼                  ▼                  ▼
//!   ┌────────────┐    ┌──────────────┐    ┌────────────┐
//!   │ normalize  │    │CatalogClient │    │  scoring   │
//!   │ (queries)  │    │ (Plex, mock) │    │ + filter   │
//!   └────────────┘    └──────────────┘    └────────────┘
//! ```
//!
//! # Module Structure
//!
//! - `domain` - Our internal types (stable, owned by us)
//! - `traits` - The `CatalogClient` seam and its test mock
//! - `plex/` - Plex Media Server client (DTOs + adapter)
//! - `normalize` - Text canonicalization and query construction
//! - `filter` - Match filter expression language
//! - `scoring` - Field comparison, filter tiers and ranking
//! - `runner` / `album` - Track and album search

pub mod album;
pub mod approach;
pub mod domain;
pub mod filter;
pub mod normalize;
pub mod plex;
pub mod runner;
pub mod scoring;
pub mod traits;

pub use approach::{SearchApproachConfig, TextProcessingConfig, default_approaches};
pub use domain::{
    Candidate, CandidateKind, CatalogError, FieldMatch, QueryRecord, ScoredCandidate,
    SearchError, SearchItem, SearchOutcome, SearchReport,
};
pub use filter::{Field, FieldMatches, FilterError, Operation, Predicate, parse_filter_expression};
pub use normalize::{create_search_string, filter_out_words, normalize, remove_featuring};
pub use runner::SearchRunner;
pub use scoring::{MatchFilterConfig, Scorer, ScoringConfig, default_match_filters};
pub use traits::CatalogClient;
