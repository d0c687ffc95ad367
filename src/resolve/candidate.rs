//! Candidate packages offered to the resolver

use crate::source::PackageSpec;
use semver::{Version, VersionReq};
use std::collections::{BTreeMap, BTreeSet};

/// One concrete package version available from one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub version: Version,
    /// Name of the source offering it
    pub source: String,
    /// Commit for git sources
    pub revision: Option<String>,
    pub dependencies: BTreeMap<String, VersionReq>,
    /// Carried over from the lockfile rather than freshly enumerated
    pub pinned: bool,
}

impl Candidate {
    pub fn from_spec(spec: PackageSpec, source: &str, revision: Option<&str>) -> Self {
        Self {
            name: spec.name,
            version: spec.version,
            source: source.to_string(),
            revision: revision.map(str::to_string),
            dependencies: spec.dependencies,
            pinned: false,
        }
    }
}

/// Immutable candidate pool, grouped by package name
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    by_name: BTreeMap<String, Vec<Candidate>>,
    sources: BTreeSet<String>,
    /// Sources backed by a package index rather than a tree
    index_sources: BTreeSet<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` was enumerated, even if it offered nothing
    pub fn add_source(&mut self, source: &str) {
        self.sources.insert(source.to_string());
    }

    /// Record an index source. Its candidates rank below tree
    /// candidates of the same version.
    pub fn add_index_source(&mut self, source: &str) {
        self.add_source(source);
        self.index_sources.insert(source.to_string());
    }

    pub fn is_index(&self, source: &str) -> bool {
        self.index_sources.contains(source)
    }

    /// Add a candidate. The first candidate for a given
    /// `(name, version, source)` wins; later duplicates are ignored.
    pub fn add(&mut self, candidate: Candidate) {
        self.sources.insert(candidate.source.clone());
        let entries = self.by_name.entry(candidate.name.clone()).or_default();
        let duplicate = entries
            .iter()
            .any(|c| c.version == candidate.version && c.source == candidate.source);
        if !duplicate {
            entries.push(candidate);
        }
    }

    /// Replace every candidate for `candidate.name` with this one
    pub fn pin(&mut self, candidate: Candidate) {
        self.sources.insert(candidate.source.clone());
        self.by_name
            .insert(candidate.name.clone(), vec![Candidate { pinned: true, ..candidate }]);
    }

    pub fn get(&self, name: &str) -> &[Candidate] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_pinned(&self, name: &str) -> bool {
        self.get(name).iter().any(|c| c.pinned)
    }

    /// Every enumerated source, in name order
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
