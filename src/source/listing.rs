//! Candidate enumeration
//!
//! Index sources list their packages in an `index.toml`. Path and git
//! sources are directory trees holding one or more `package.toml` files.

use crate::error::{PinionError, PinionResult};
use crate::version::{parse_requirement, parse_version};
use semver::{Version, VersionReq};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Package metadata file name inside path and git trees
pub const PACKAGE_FILE: &str = "package.toml";

/// Listing file name inside an index directory
pub const INDEX_FILE: &str = "index.toml";

/// How many directory levels below the root are searched for packages
const MAX_SCAN_DEPTH: usize = 2;

/// One published version of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: Version,
    pub dependencies: BTreeMap<String, VersionReq>,
}

#[derive(Debug, Deserialize)]
struct PackageFile {
    package: PackageMeta,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PackageMeta {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    package: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    version: String,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

impl PackageSpec {
    /// Parse a `package.toml` document
    pub fn parse(content: &str, path: &Path) -> PinionResult<Self> {
        let file: PackageFile = toml::from_str(content).map_err(|e| PinionError::PackageInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::build(file.package.name, &file.package.version, file.dependencies, path)
    }

    fn build(
        name: String,
        version: &str,
        dependencies: BTreeMap<String, String>,
        path: &Path,
    ) -> PinionResult<Self> {
        let invalid = |reason: String| PinionError::PackageInvalid {
            path: path.to_path_buf(),
            reason,
        };

        let version = parse_version(version).map_err(invalid)?;
        let dependencies = dependencies
            .into_iter()
            .map(|(dep, req)| Ok((dep, parse_requirement(&req).map_err(invalid)?)))
            .collect::<PinionResult<_>>()?;

        Ok(Self {
            name,
            version,
            dependencies,
        })
    }
}

/// Read an index listing from a directory (or the listing file itself)
pub async fn read_index(location: &Path) -> PinionResult<Vec<PackageSpec>> {
    let path = if location.is_dir() {
        location.join(INDEX_FILE)
    } else {
        location.to_path_buf()
    };

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| PinionError::io(format!("reading index {}", path.display()), e))?;

    let index: IndexFile = toml::from_str(&content).map_err(|e| PinionError::PackageInvalid {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let specs = index
        .package
        .into_iter()
        .map(|entry| PackageSpec::build(entry.name, &entry.version, entry.dependencies, &path))
        .collect::<PinionResult<Vec<_>>>()?;

    debug!("Read {} index entries from {}", specs.len(), path.display());
    Ok(specs)
}

/// Find every `package.toml` in a tree, ordered by path.
///
/// Searches the root and up to two directory levels below it, skipping
/// `.git` directories.
pub async fn scan_tree(root: &Path) -> PinionResult<Vec<(PathBuf, PackageSpec)>> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = pending.pop() {
        let manifest = dir.join(PACKAGE_FILE);
        if manifest.is_file() {
            let content = tokio::fs::read_to_string(&manifest)
                .await
                .map_err(|e| PinionError::io(format!("reading {}", manifest.display()), e))?;
            found.push((manifest.clone(), PackageSpec::parse(&content, &manifest)?));
        }

        if depth == MAX_SCAN_DEPTH {
            continue;
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| PinionError::io(format!("listing {}", dir.display()), e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PinionError::io(format!("listing {}", dir.display()), e))?
        {
            let path = entry.path();
            if path.is_dir() && entry.file_name() != ".git" {
                pending.push((path, depth + 1));
            }
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    debug!("Found {} packages under {}", found.len(), root.display());
    Ok(found)
}
