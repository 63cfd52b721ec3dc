//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `search`: Track and album search against a Plex server
//! - `text`: Normalizer and filter-expression tools
//! - `settings`: Credentials check and config file management

mod search;
mod settings;
mod text;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

pub use search::{cmd_album, cmd_search};
pub use settings::{cmd_config, cmd_credentials};
pub use text::{cmd_filter, cmd_normalize};

/// Plex Music Search CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the OS config directory)
    #[arg(long, global = true, env = "PLEX_MUSIC_SEARCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection overrides shared by the search commands
#[derive(clap::Args, Debug, Clone)]
pub struct PlexArgs {
    /// Plex server URI (overrides the config file)
    #[arg(long, env = "PLEX_URI")]
    pub uri: Option<String>,
    /// Plex token (overrides the config file)
    #[arg(long, env = "PLEX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Find the best matching Plex track for one or more songs
    Search {
        /// Track title
        #[arg(long, required_unless_present = "items")]
        title: Option<String>,
        /// Artist name (repeat for multiple artists, primary first)
        #[arg(long = "artist")]
        artists: Vec<String>,
        /// Album name
        #[arg(long)]
        album: Option<String>,
        /// JSON file with an array of search items
        #[arg(long, conflicts_with = "title")]
        items: Option<PathBuf>,
        /// Only run these approach ids (default: all configured approaches)
        #[arg(long = "approach")]
        approaches: Vec<String>,
        /// Run every approach and show every query
        #[arg(long)]
        analyze: bool,
        /// Items searched at the same time
        #[arg(long, default_value = "4")]
        concurrency: usize,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
        /// Append one sync log entry per item to this JSON-lines file
        #[arg(long)]
        sync_log: Option<PathBuf>,
        #[command(flatten)]
        plex: PlexArgs,
    },
    /// Match the tracks of one album
    Album {
        /// Album title
        #[arg(long, required_unless_present = "items")]
        album: Option<String>,
        /// Album artist (repeat for multiple artists)
        #[arg(long = "artist")]
        artists: Vec<String>,
        /// Track titles to match (repeat)
        #[arg(long = "track")]
        tracks: Vec<String>,
        /// JSON file with an array of search items from one album
        #[arg(long, conflicts_with = "album")]
        items: Option<PathBuf>,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        plex: PlexArgs,
    },
    /// Show how a title is normalized and turned into queries
    Normalize {
        /// Text to normalize
        text: String,
        /// Artist, for the combined search string
        #[arg(long)]
        artist: Option<String>,
    },
    /// Parse a match filter expression and optionally evaluate it
    Filter {
        /// Expression, e.g. "artist:match AND (title:contains OR album:match)"
        expression: String,
        /// Field outcomes to evaluate against, e.g. --set artist=true
        #[arg(long = "set", value_parser = parse_field_flag)]
        fields: Vec<(String, bool)>,
    },
    /// Validate slskd credentials
    Credentials {
        /// Base URL (defaults to the config file)
        #[arg(long)]
        base_url: Option<String>,
        /// API key (defaults to the config file)
        #[arg(long, env = "SLSKD_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Read credentials from a JSON file instead
        #[arg(long, conflicts_with_all = ["base_url", "api_key"])]
        json: Option<PathBuf>,
    },
    /// Show, locate or initialize the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `config` subcommands
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the effective settings (secrets masked)
    Show,
    /// Print the config file path
    Path,
    /// Write the default settings to the config file if it doesn't exist
    Init,
    /// Check the config file and report problems
    Validate,
}

/// Parse `field=true|false`
fn parse_field_flag(s: &str) -> Result<(String, bool), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=true|false, got '{}'", s))?;
    let value = match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        other => return Err(format!("expected true or false, got '{}'", other)),
    };
    Ok((field.trim().to_string(), value))
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let config = cli.config.clone();

    match &cli.command {
        Commands::Search {
            title,
            artists,
            album,
            items,
            approaches,
            analyze,
            concurrency,
            json,
            sync_log,
            plex,
        } => {
            let options = search::SearchOptions {
                approaches: approaches.clone(),
                analyze: *analyze,
                concurrency: *concurrency,
                json: *json,
                sync_log: sync_log.clone(),
            };
            let input = search::ItemInput {
                title: title.clone(),
                artists: artists.clone(),
                album: album.clone(),
                items: items.clone(),
            };
            cmd_search(&rt, config, plex, input, &options)
        }
        Commands::Album {
            album,
            artists,
            tracks,
            items,
            json,
            plex,
        } => cmd_album(
            &rt,
            config,
            plex,
            album.as_deref(),
            artists,
            tracks,
            items.as_deref(),
            *json,
        ),
        Commands::Normalize { text, artist } => {
            cmd_normalize(config, text, artist.as_deref());
            Ok(())
        }
        Commands::Filter { expression, fields } => cmd_filter(expression, fields),
        Commands::Credentials {
            base_url,
            api_key,
            json,
        } => cmd_credentials(config, base_url.as_deref(), api_key.as_deref(), json.as_deref()),
        Commands::Config { action } => cmd_config(config, *action),
    }
}
