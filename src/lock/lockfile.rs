//! Lockfile model and canonical serialization
//!
//! The lockfile records every resolved package and, per source, the
//! fingerprint it was resolved against plus the git revision in use.
//! Serialization is canonical: same content in, same bytes out.

use crate::error::{PinionError, PinionResult};
use crate::source::{Fingerprint, RefKind, SourceKind};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Default lockfile name, next to the manifest
pub const LOCKFILE_NAME: &str = "pinion.lock";

/// Current lockfile format version
pub const LOCK_VERSION: u32 = 1;

const HEADER: &str = "# This file is generated by pinion. Do not edit it by hand.\n\n";

/// A source as it was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedSource {
    pub name: String,
    pub kind: SourceKind,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_kind: Option<RefKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_value: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub submodules: bool,
    /// Commit checked out for git sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LockedSource {
    pub fn new(name: impl Into<String>, fingerprint: Fingerprint, revision: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind: fingerprint.kind,
            location: fingerprint.location,
            ref_kind: fingerprint.ref_kind,
            ref_value: fingerprint.ref_value,
            submodules: fingerprint.submodules,
            revision,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            kind: self.kind,
            location: self.location.clone(),
            ref_kind: self.ref_kind,
            ref_value: self.ref_value.clone(),
            submodules: self.submodules,
        }
    }
}

/// A resolved package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPackage {
    pub name: String,
    pub version: Version,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, VersionReq>,
}

/// The `pinion.lock` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: u32,
    /// Tool version that wrote the file
    pub tool: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default, rename = "source", skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<LockedSource>,
    #[serde(default, rename = "package", skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<LockedPackage>,
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new()
    }
}

impl Lockfile {
    /// Create an empty lockfile stamped with this tool's version
    pub fn new() -> Self {
        Self {
            version: LOCK_VERSION,
            tool: tool_marker(),
            platforms: Vec::new(),
            sources: Vec::new(),
            packages: Vec::new(),
        }
    }

    /// Parse lockfile text
    pub fn parse(content: &str, path: &Path) -> PinionResult<Self> {
        let lock: Lockfile = toml::from_str(content).map_err(|e| PinionError::LockfileInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if lock.version != LOCK_VERSION {
            return Err(PinionError::LockfileInvalid {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported lockfile version {} (expected {})",
                    lock.version, LOCK_VERSION
                ),
            });
        }
        Ok(lock)
    }

    /// Read the lockfile if one exists
    pub async fn load(path: &Path) -> PinionResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PinionError::io(format!("reading lockfile {}", path.display()), e))?;
        Self::parse(&content, path).map(Some)
    }

    /// Sort every collection into canonical order
    pub fn canonicalize(&mut self) {
        let platforms: BTreeSet<String> = self.platforms.drain(..).collect();
        self.platforms = platforms.into_iter().collect();
        self.sources.sort_by(|a, b| a.name.cmp(&b.name));
        self.packages.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Serialize in canonical form
    pub fn to_canonical_string(&self) -> PinionResult<String> {
        let mut canonical = self.clone();
        canonical.canonicalize();
        let body = toml::to_string(&canonical)?;
        Ok(format!("{}{}", HEADER, body))
    }

    pub fn package(&self, name: &str) -> Option<&LockedPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn source(&self, name: &str) -> Option<&LockedSource> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Names of packages locked from the given source
    pub fn packages_from_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.packages
            .iter()
            .filter(move |p| p.source == source)
            .map(|p| p.name.as_str())
    }

    /// Reverse dependency edges: package -> packages that depend on it
    pub fn dependents(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut reverse: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for package in &self.packages {
            for dep in package.dependencies.keys() {
                reverse.entry(dep.as_str()).or_default().push(package.name.as_str());
            }
        }
        reverse
    }
}

/// Tool-version marker recorded in every lockfile
pub fn tool_marker() -> String {
    format!("pinion {}", env!("CARGO_PKG_VERSION"))
}

/// Platform identifier of the running process, e.g. `x86_64-linux`
pub fn current_platform() -> String {
    format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{GitSource, Source};

    fn sample() -> Lockfile {
        let mut lock = Lockfile::new();
        lock.platforms = vec!["x86_64-linux".to_string(), "aarch64-macos".to_string()];
        lock.sources.push(LockedSource::new(
            "foo",
            Source::Git(GitSource::branch("/repos/foo", "omg")).fingerprint(),
            Some("a".repeat(40)),
        ));
        lock.packages.push(LockedPackage {
            name: "rails".to_string(),
            version: Version::new(3, 0, 0),
            source: "foo".to_string(),
            revision: Some("a".repeat(40)),
            dependencies: BTreeMap::from([(
                "activesupport".to_string(),
                VersionReq::parse("=3.0").unwrap(),
            )]),
        });
        lock.packages.push(LockedPackage {
            name: "activesupport".to_string(),
            version: Version::new(3, 0, 0),
            source: "foo".to_string(),
            revision: Some("a".repeat(40)),
            dependencies: BTreeMap::new(),
        });
        lock
    }

    #[test]
    fn canonical_text_roundtrips() {
        let lock = sample();
        let text = lock.to_canonical_string().unwrap();
        let parsed = Lockfile::parse(&text, Path::new("pinion.lock")).unwrap();
        assert_eq!(parsed.to_canonical_string().unwrap(), text);
    }

    #[test]
    fn canonical_text_is_sorted() {
        let text = sample().to_canonical_string().unwrap();
        assert!(text.starts_with("# This file is generated by pinion"));
        let active = text.find("name = \"activesupport\"").unwrap();
        let rails = text.find("name = \"rails\"").unwrap();
        assert!(active < rails);
        let aarch = text.find("aarch64-macos").unwrap();
        let x86 = text.find("x86_64-linux").unwrap();
        assert!(aarch < x86);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = sample();
        let mut b = sample();
        b.packages.reverse();
        b.platforms.reverse();
        b.platforms.push("x86_64-linux".to_string());
        assert_eq!(
            a.to_canonical_string().unwrap(),
            b.to_canonical_string().unwrap()
        );
    }

    #[test]
    fn rejects_future_version() {
        let text = "version = 99\ntool = \"pinion 9\"\nplatforms = []\n";
        let err = Lockfile::parse(text, Path::new("pinion.lock")).unwrap_err();
        assert!(err.to_string().contains("unsupported lockfile version 99"));
    }

    #[test]
    fn dependents_reverse_edges() {
        let lock = sample();
        let reverse = lock.dependents();
        assert_eq!(reverse.get("activesupport"), Some(&vec!["rails"]));
        assert!(!reverse.contains_key("rails"));
    }

    #[test]
    fn source_fingerprint_roundtrip() {
        let fp = Source::Git(GitSource::tag("/r", "v1").with_submodules(true)).fingerprint();
        let locked = LockedSource::new("r", fp.clone(), None);
        assert_eq!(locked.fingerprint(), fp);
    }

    #[tokio::test]
    async fn load_absent_lockfile() {
        let temp = tempfile::TempDir::new().unwrap();
        let lock = Lockfile::load(&temp.path().join(LOCKFILE_NAME)).await.unwrap();
        assert!(lock.is_none());
    }
}
