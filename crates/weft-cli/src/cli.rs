//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default corpus location, relative to the working directory.
pub const DEFAULT_CORPUS: &str = "demos/fastapi-corpus.json";

/// Weft - hybrid knowledge query engine
#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(author, version, about = "Query a knowledge corpus by vector similarity and graph proximity", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "WEFT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Corpus file (JSON chunks, nodes, and edges)
    #[arg(long, env = "WEFT_CORPUS", default_value = DEFAULT_CORPUS, global = true)]
    pub corpus: PathBuf,

    /// Redis URL for the result cache (in-memory when omitted)
    #[cfg(feature = "redis")]
    #[arg(long, env = "WEFT_REDIS_URL", global = true)]
    pub redis_url: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the corpus
    Search {
        /// Query text
        query: String,

        /// Execution strategy (e.g. hybrid-balanced, graph-only); the
        /// analyzer picks one when omitted
        #[arg(short, long)]
        strategy: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum chunk quality score
        #[arg(short, long)]
        quality_threshold: Option<f32>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,

        /// Run the query this many times (later runs hit the cache)
        #[arg(long, default_value_t = 1)]
        repeat: usize,
    },

    /// Suggest known concepts for a partial query
    Suggest {
        /// Partial text
        partial: String,
    },

    /// Show how a query is analyzed
    Analyze {
        /// Query text
        query: String,
    },

    /// Configuration commands
    Config {
        /// Config action
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration as TOML
    Show,

    /// Get one configuration value
    Get {
        /// Field name (e.g. semantic_weight)
        key: String,
    },

    /// Set one value in a configuration file
    Set {
        /// Field name
        key: String,
        /// New value
        value: String,
    },

    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(long, default_value = "weft.toml")]
        file: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration as WEFT_* environment variables
    Export {
        /// Format as docker --env flags
        #[arg(long)]
        docker_env: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================
