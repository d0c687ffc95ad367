//! Configuration schema for pinion
//!
//! Configuration is stored at `~/.config/pinion/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Git cache settings
    pub cache: CacheConfig,

    /// Source fetching
    pub fetch: FetchConfig,

    /// Lockfile settings
    pub lock: LockConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Git cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root for mirrors and checkouts (default: OS cache dir)
    pub dir: Option<PathBuf>,
}

/// Fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of sources fetched concurrently
    pub jobs: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// Lockfile configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Extra platforms to record besides the current one
    pub platforms: Vec<String>,
}
