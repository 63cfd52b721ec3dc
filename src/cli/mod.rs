//! Command-line interface for plex-music-search.
//!
//! This module provides CLI commands for searching tracks and albums,
//! previewing query normalization, checking filter expressions, and
//! managing credentials and the config file.

mod commands;

pub use commands::{Cli, Commands, run_command};
