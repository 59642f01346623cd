mod dump;
mod ls;
mod map;
mod repository;
mod resolve;
mod view;

pub use repository::Repository;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sling-resolver",
    version,
    about = "Resolve and map URLs against a resource tree",
    long_about = "Loads a resource tree from JSON into an in-memory provider, builds the URL mapping \
                  index over it (the /etc/map configuration, vanity paths and aliases) and answers \
                  resolution and mapping questions against that index."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the resource tree and the resolver configuration come from.
#[derive(Args, Clone, Debug)]
pub struct Source {
    /// JSON object of resource path to properties. Defaults to ~/.sling-resolver/content.json
    #[arg(long, value_name = "FILE")]
    pub content: Option<PathBuf>,

    /// JSON resolver configuration (mappings, map root, vanity path settings)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a request URL to repository paths or a redirect
    #[command(
        long_about = "Turns an absolute request URL into its scheme/host.port/path map path and walks \
                            the resolve entries, most specific pattern first."
    )]
    Resolve {
        #[arg(value_name = "URL")]
        url: String,
        #[command(flatten)]
        source: Source,
    },
    /// Map a repository path to its external map paths
    Map {
        #[arg(value_name = "PATH")]
        path: String,
        #[command(flatten)]
        source: Source,
    },
    /// Print every resolve and map entry of the index
    #[command(long_about = "Prints the resolve entries in the order they are tried, followed by the map entries.")]
    Dump {
        /// Emit JSON instead of tables
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        source: Source,
    },
    /// List the children of a resource, including synthetic mount point ancestors
    Ls {
        #[arg(value_name = "PATH", default_value = "/")]
        path: String,
        #[command(flatten)]
        source: Source,
    },
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = sling_resolver_core::logging::init_logging("cli", true);

    match cli.command {
        Commands::Resolve { url, source } => resolve::run(&source, &url),
        Commands::Map { path, source } => map::run(&source, &path),
        Commands::Dump { json, source } => dump::run(&source, json),
        Commands::Ls { path, source } => ls::run(&source, &path),
    }
}
