//! Manifest parsing
//!
//! A project declares its sources and requirements in `pinion.toml`:
//!
//! ```toml
//! [sources.foo]
//! git = "https://example.com/foo.git"
//! branch = "main"
//! submodules = true
//!
//! [dependencies]
//! foo = { version = "1.0", source = "foo" }
//!
//! [group.test.dependencies]
//! rspec = ">=2"
//! ```
//!
//! Dependencies without an explicit `source` come from the source named
//! `default`.

use crate::error::{PinionError, PinionResult};
use crate::source::{GitSource, IndexSource, PathSource, RefKind, Source};
use crate::version::parse_requirement;
use semver::VersionReq;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default manifest file name
pub const MANIFEST_FILE: &str = "pinion.toml";

/// Source used by dependencies that don't name one
pub const DEFAULT_SOURCE: &str = "default";

/// Group of requirements declared under `[dependencies]`
pub const DEFAULT_GROUP: &str = "default";

/// A single declared requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub constraint: VersionReq,
    /// Name of the source the package must come from
    pub source: String,
    pub group: String,
}

impl Requirement {
    /// Where this requirement came from, for error messages
    pub fn origin(&self) -> String {
        format!("{} [{}]", MANIFEST_FILE, self.group)
    }
}

/// Parsed `pinion.toml`
#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: PathBuf,
    pub sources: BTreeMap<String, Source>,
    /// Default group first, then named groups in name order
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    sources: BTreeMap<String, RawSource>,
    #[serde(default)]
    dependencies: BTreeMap<String, RawDependency>,
    #[serde(default)]
    group: BTreeMap<String, RawGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSource {
    index: Option<String>,
    path: Option<String>,
    git: Option<String>,
    branch: Option<String>,
    tag: Option<String>,
    rev: Option<String>,
    submodules: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Version(String),
    Detailed {
        #[serde(default)]
        version: String,
        source: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    #[serde(default)]
    dependencies: BTreeMap<String, RawDependency>,
}

impl Manifest {
    /// Read and parse a manifest from disk
    pub async fn from_file(path: &Path) -> PinionResult<Self> {
        if !path.exists() {
            return Err(PinionError::ManifestNotFound(path.to_path_buf()));
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PinionError::io(format!("reading manifest {}", path.display()), e))?;
        Self::parse(&content, path)
    }

    /// Parse manifest text; relative source paths resolve against the
    /// manifest's directory
    pub fn parse(content: &str, path: &Path) -> PinionResult<Self> {
        let invalid = |reason: String| PinionError::ManifestInvalid {
            path: path.to_path_buf(),
            reason,
        };

        let raw: RawManifest = toml::from_str(content).map_err(|e| invalid(e.to_string()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut sources = BTreeMap::new();
        for (name, raw_source) in raw.sources {
            let source = build_source(&name, raw_source, base).map_err(invalid)?;
            sources.insert(name, source);
        }

        let mut requirements = Vec::new();
        let groups = std::iter::once((DEFAULT_GROUP.to_string(), raw.dependencies))
            .chain(raw.group.into_iter().map(|(name, g)| (name, g.dependencies)));
        for (group, deps) in groups {
            for (name, dep) in deps {
                let (version, source) = match dep {
                    RawDependency::Version(v) => (v, None),
                    RawDependency::Detailed { version, source } => (version, source),
                };
                let constraint = parse_requirement(&version)
                    .map_err(|e| invalid(format!("dependency {}: {}", name, e)))?;
                let source = source.unwrap_or_else(|| DEFAULT_SOURCE.to_string());

                if !sources.contains_key(&source) {
                    return Err(PinionError::MissingSource {
                        package: name,
                        searched: format!("source '{}', which {} does not declare", source, MANIFEST_FILE),
                    });
                }

                requirements.push(Requirement {
                    name,
                    constraint,
                    source,
                    group: group.clone(),
                });
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            sources,
            requirements,
        })
    }

    /// Names of packages required from the given source
    pub fn packages_from_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.requirements
            .iter()
            .filter(move |r| r.source == source)
            .map(|r| r.name.as_str())
    }

    /// Whether any requirement names this package
    pub fn requires(&self, name: &str) -> bool {
        self.requirements.iter().any(|r| r.name == name)
    }
}

fn build_source(name: &str, raw: RawSource, base: &Path) -> Result<Source, String> {
    let kinds = [raw.index.is_some(), raw.path.is_some(), raw.git.is_some()]
        .iter()
        .filter(|k| **k)
        .count();
    if kinds != 1 {
        return Err(format!(
            "source '{}' must set exactly one of index, path or git",
            name
        ));
    }

    let refs = [&raw.branch, &raw.tag, &raw.rev]
        .iter()
        .filter(|r| r.is_some())
        .count();

    if let Some(url) = raw.git {
        if refs > 1 {
            return Err(format!(
                "source '{}' may set only one of branch, tag or rev",
                name
            ));
        }
        let git = match (raw.branch, raw.tag, raw.rev) {
            (Some(branch), _, _) => GitSource::branch(url, branch),
            (_, Some(tag), _) => GitSource::tag(url, tag),
            (_, _, Some(rev)) => GitSource::revision(url, rev),
            _ => GitSource::new(url).with_ref(RefKind::Default, ""),
        };
        return Ok(Source::Git(git.with_submodules(raw.submodules.unwrap_or(false))));
    }

    if refs > 0 || raw.submodules.is_some() {
        return Err(format!(
            "source '{}': branch, tag, rev and submodules only apply to git sources",
            name
        ));
    }

    if let Some(index) = raw.index {
        return Ok(Source::Index(IndexSource {
            location: base.join(index),
        }));
    }

    match raw.path {
        Some(path) => Ok(Source::Path(PathSource {
            path: base.join(path),
        })),
        None => Err(format!("source '{}' has no location", name)),
    }
}
