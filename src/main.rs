//! Plex Music Search - find the best matching Plex track for a song.
//!
//! Songs from an external source (a playlist export, a sync queue) are
//! searched against a Plex server's music library with several query
//! approaches, scored field by field and accepted through configurable
//! match filters.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod search;
pub mod sync_log;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Logs go to stderr so JSON output on stdout stays clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("plex_music_search=info".parse()?))
        .init();

    cli::run_command(&args)
}
