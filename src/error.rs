//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the application.
//! Library modules use specific error types via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - Module-specific errors ([`SearchError`], [`CatalogError`],
//!   [`ConfigError`], [`SyncLogError`]) for detailed handling
//! - All errors implement `std::error::Error` for compatibility
//!
//! # Example
//!
//! ```ignore
//! use plex_music_search::error::{Error, Result, ResultExt};
//!
//! fn read_items(path: &Path) -> Result<Vec<SearchItem>> {
//!     let text = std::fs::read_to_string(path).with_context("reading items")?;
//!     Ok(serde_json::from_str(&text)?)
//! }
//! ```

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::search::{CatalogError, FilterError, SearchError};
use crate::sync_log::SyncLogError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON input/output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings could not be saved or were invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Search aborted
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Catalog call failed outside a search
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Sync log could not be written
    #[error("Sync log error: {0}")]
    SyncLog(#[from] SyncLogError),

    /// File not found
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl From<FilterError> for Error {
    fn from(err: FilterError) -> Self {
        Self::Search(SearchError::Filter(err))
    }
}

impl Error {
    /// Create a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an invalid input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// The search was cancelled, possibly under layers of context
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Search(SearchError::Cancelled) => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, SearchError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Search(e).context(ctx))
    }
}
