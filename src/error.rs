//! Error types for pinion
//!
//! All modules use `PinionResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pinion operations
pub type PinionResult<T> = Result<T, PinionError>;

/// All errors that can occur in pinion
#[derive(Error, Debug)]
pub enum PinionError {
    // Resolution errors
    #[error("Failed to fetch {url} ({reference}): {reason}")]
    Fetch {
        url: String,
        reference: String,
        reason: String,
    },

    #[error(
        "Could not find compatible versions for package {package}:\n{}",
        format_constraints(.constraints)
    )]
    Conflict {
        package: String,
        constraints: Vec<String>,
    },

    #[error("Could not find package {package} in {searched}")]
    MissingSource { package: String, searched: String },

    #[error("No such source or package to update: {0}")]
    InvalidRequest(String),

    #[error("Resolution gave up after {steps} steps")]
    ResolutionExhausted { steps: usize },

    // Manifest and lockfile errors
    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Invalid manifest at {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Invalid package metadata at {path}: {reason}")]
    PackageInvalid { path: PathBuf, reason: String },

    #[error("Invalid lockfile at {path}: {reason}")]
    LockfileInvalid { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

fn format_constraints(constraints: &[String]) -> String {
    constraints
        .iter()
        .map(|c| format!("  {}", c))
        .collect::<Vec<_>>()
        .join("\n")
}

impl PinionError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a fetch error for a git source
    pub fn fetch(url: impl Into<String>, reference: impl Into<String>, cause: &PinionError) -> Self {
        let reason = match cause {
            Self::CommandExecution { stderr, .. } => stderr.trim().to_string(),
            other => other.to_string(),
        };
        Self::Fetch {
            url: url.into(),
            reference: reference.into(),
            reason,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Fetch { .. } => {
                Some("Check network access and that the branch, tag or revision exists, then re-run")
            }
            Self::Conflict { .. } => Some("Relax one of the listed constraints in pinion.toml"),
            Self::MissingSource { .. } => {
                Some("Check the package name and the source it is declared under in pinion.toml")
            }
            Self::InvalidRequest(_) => Some("Run `pinion update` with a package or source name from pinion.toml"),
            Self::ManifestNotFound(_) => Some("Create a pinion.toml or pass --manifest"),
            Self::ResolutionExhausted { .. } => Some("Pin some dependencies to narrower versions"),
            _ => None,
        }
    }
}
