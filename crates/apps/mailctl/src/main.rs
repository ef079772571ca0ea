//! mailctl - inspect and edit a mailstore database
//!
//! Opens the store described by the mailstore config (or `--db`) and runs a
//! single command against one namespace.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;
use mailstore::{NamespacedStore, SqliteMessageStore, StoreConfig};

mod commands;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "mailctl", version, about = "Inspect and edit captured mail")]
struct Cli {
    /// Database file; overrides the configured path
    #[arg(long = "db", global = true)]
    db: Option<PathBuf>,

    /// Mirror namespace; overrides the configured bucket
    #[arg(long, global = true)]
    bucket: Option<String>,

    /// Namespace to operate on (defaults to the mirror namespace)
    #[arg(short, long, env = "MAILCTL_NAMESPACE", global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every namespace in the store
    Namespaces,
    /// Count messages in the namespace
    Count,
    /// List messages, most recent first
    List {
        /// Number of messages to skip
        #[arg(long, default_value_t = 0)]
        start: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Search messages by sender, recipient or body
    Search {
        /// "from", "to", or anything else to search the raw body
        kind: String,
        query: String,
        /// Rank of the first match to show, counting from 1
        #[arg(long, default_value_t = 1)]
        start: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Print one message as JSON
    Show { id: String },
    /// Delete one message
    Delete { id: String },
    /// Delete every message in the namespace
    Clear,
    /// Store a raw message read from a file or stdin
    Import {
        /// Envelope sender (MAIL FROM)
        #[arg(long)]
        from: String,
        /// Envelope recipient (RCPT TO); repeat for several
        #[arg(long = "to", required = true)]
        to: Vec<String>,
        #[arg(long, default_value = "localhost")]
        helo: String,
        /// File holding the message data; stdin when omitted
        file: Option<PathBuf>,
    },
    /// Print the effective store configuration
    Config {
        /// Also write it to the config directory
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    let mut store_config = StoreConfig::load().context("Failed to load store configuration")?;
    if let Some(db) = cli.db {
        store_config.path = db;
    }
    if let Some(bucket) = cli.bucket {
        store_config.bucket = bucket;
    }

    if let Command::Config { save } = cli.command {
        return commands::show_config(&store_config, save);
    }

    let store = SqliteMessageStore::open(&store_config)
        .with_context(|| format!("Failed to open store at {}", store_config.path.display()))?;

    let namespace = cli
        .namespace
        .unwrap_or_else(|| store.default_namespace().to_string());

    commands::run(&store, &namespace, cli.command, &mut io::stdout().lock())
}
