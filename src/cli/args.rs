//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// pinion - reproducible dependency locking
///
/// Resolves the requirements in pinion.toml, including packages from git
/// repositories, into a pinned pinion.lock and keeps it in sync with
/// manifest edits.
#[derive(Parser, Debug)]
#[command(name = "pinion")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PINION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Manifest path
    #[arg(short, long, global = true, env = "PINION_MANIFEST", default_value = "pinion.toml")]
    pub manifest: PathBuf,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the manifest, keeping every still-valid locked version
    Install(InstallArgs),

    /// Re-resolve everything, or only the named packages and sources
    Update(UpdateArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Manage the git mirror and checkout cache
    Cache(CacheArgs),
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Lockfile path (defaults to pinion.lock next to the manifest)
    #[arg(long)]
    pub lockfile: Option<PathBuf>,
}

/// Arguments for the update command
#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Packages or sources to update (all if none given)
    pub names: Vec<String>,

    /// Update every package from this source
    #[arg(long = "source", value_name = "NAME")]
    pub sources: Vec<String>,

    /// Lockfile path (defaults to pinion.lock next to the manifest)
    #[arg(long)]
    pub lockfile: Option<PathBuf>,
}

impl UpdateArgs {
    /// Positional names followed by `--source` names
    pub fn targets(&self) -> Vec<String> {
        self.names
            .iter()
            .chain(self.sources.iter())
            .cloned()
            .collect()
    }
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached mirrors and checkouts
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove every cached mirror and checkout
    Clear,
}

/// Output format for cache listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}
