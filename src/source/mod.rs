//! Package sources
//!
//! A source is where candidate packages come from: a local index listing,
//! a directory on disk, or a git repository pinned to a branch, tag or
//! revision. Every source reduces to a [`Fingerprint`] that is compared
//! against the lockfile to detect configuration drift.

pub mod fingerprint;
pub mod listing;

pub use fingerprint::Fingerprint;
pub use listing::{read_index, scan_tree, PackageSpec};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of source, recorded in the lockfile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Index,
    Path,
    Git,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Path => write!(f, "path"),
            Self::Git => write!(f, "git"),
        }
    }
}

/// How a git source names the commit it wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Branch,
    Tag,
    Revision,
    Default,
}

impl RefKind {
    /// Human-readable ref, e.g. `branch omg` or `default branch`
    pub fn describe(self, value: &str) -> String {
        match self {
            Self::Default => "default branch".to_string(),
            kind => format!("{} {}", kind, value),
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch => write!(f, "branch"),
            Self::Tag => write!(f, "tag"),
            Self::Revision => write!(f, "revision"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// A package index read from the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSource {
    /// Directory containing `index.toml`, or the listing file itself
    pub location: PathBuf,
}

/// A directory containing one or more `package.toml` files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSource {
    pub path: PathBuf,
}

/// A git repository pinned to a ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub url: String,
    pub ref_kind: RefKind,
    /// Branch, tag or revision name; empty for the default branch
    pub ref_value: String,
    pub submodules: bool,
}

impl GitSource {
    /// Track the remote's default branch
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ref_kind: RefKind::Default,
            ref_value: String::new(),
            submodules: false,
        }
    }

    pub fn branch(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(url).with_ref(RefKind::Branch, name)
    }

    pub fn tag(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(url).with_ref(RefKind::Tag, name)
    }

    pub fn revision(url: impl Into<String>, rev: impl Into<String>) -> Self {
        Self::new(url).with_ref(RefKind::Revision, rev)
    }

    pub fn with_ref(mut self, kind: RefKind, value: impl Into<String>) -> Self {
        self.ref_kind = kind;
        self.ref_value = match kind {
            RefKind::Default => String::new(),
            _ => value.into(),
        };
        self
    }

    pub fn with_submodules(mut self, submodules: bool) -> Self {
        self.submodules = submodules;
        self
    }

    /// Branch sources float: their tip may move between runs
    pub fn is_floating(&self) -> bool {
        self.ref_kind == RefKind::Branch
    }

    /// Human-readable ref, e.g. `branch omg` or `default branch`
    pub fn describe_ref(&self) -> String {
        self.ref_kind.describe(&self.ref_value)
    }
}

/// Any package source declared in a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Index(IndexSource),
    Path(PathSource),
    Git(GitSource),
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Index(_) => SourceKind::Index,
            Self::Path(_) => SourceKind::Path,
            Self::Git(_) => SourceKind::Git,
        }
    }

    /// Identity of this source, excluding any resolved revision
    pub fn fingerprint(&self) -> Fingerprint {
        match self {
            Self::Index(index) => Fingerprint {
                kind: SourceKind::Index,
                location: index.location.display().to_string(),
                ref_kind: None,
                ref_value: None,
                submodules: false,
            },
            Self::Path(path) => Fingerprint {
                kind: SourceKind::Path,
                location: path.path.display().to_string(),
                ref_kind: None,
                ref_value: None,
                submodules: false,
            },
            Self::Git(git) => Fingerprint {
                kind: SourceKind::Git,
                location: git.url.clone(),
                ref_kind: Some(git.ref_kind),
                ref_value: match git.ref_kind {
                    RefKind::Default => None,
                    _ => Some(git.ref_value.clone()),
                },
                submodules: git.submodules,
            },
        }
    }

    pub fn as_git(&self) -> Option<&GitSource> {
        match self {
            Self::Git(git) => Some(git),
            _ => None,
        }
    }

    /// Whether packages from this source must be re-resolved on every run
    pub fn is_floating(&self) -> bool {
        self.as_git().is_some_and(GitSource::is_floating)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index.location.display()),
            Self::Path(path) => write!(f, "{}", path.path.display()),
            Self::Git(git) => match git.ref_kind {
                RefKind::Default => write!(f, "{}", git.url),
                _ => write!(f, "{} (at {})", git.url, git.ref_value),
            },
        }
    }
}
