//! Unlock set calculation
//!
//! Decides which locked packages may be re-resolved this run. Everything
//! outside the unlock set is pinned to exactly what the lockfile says.

use crate::error::{PinionError, PinionResult};
use crate::lock::lockfile::Lockfile;
use crate::manifest::Manifest;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// What the user asked to update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateRequest {
    /// Plain run: keep everything that is still valid
    Nothing,
    /// Re-resolve every package
    Everything,
    /// Re-resolve the named packages or sources and their dependents
    Only(Vec<String>),
}

impl UpdateRequest {
    /// Build a request from CLI-style input: no names means everything
    pub fn from_names(names: Vec<String>) -> Self {
        if names.is_empty() {
            Self::Everything
        } else {
            Self::Only(names)
        }
    }
}

/// Packages eligible for re-resolution this run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockSet {
    names: BTreeSet<String>,
    /// Seeded by the update request itself, not by drift or dependents
    requested: BTreeSet<String>,
    everything: bool,
}

impl UnlockSet {
    /// Unlock every package
    pub fn all() -> Self {
        Self {
            names: BTreeSet::new(),
            requested: BTreeSet::new(),
            everything: true,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.everything || self.names.contains(name)
    }

    pub fn is_everything(&self) -> bool {
        self.everything
    }

    /// Explicitly unlocked names (empty when everything is unlocked)
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Unlock more packages after the fact, with their dependents
    pub fn unlock(&mut self, names: BTreeSet<String>, lock: &Lockfile) {
        if self.everything || names.is_empty() {
            return;
        }
        debug!("Also unlocking {:?}", names);
        self.names.extend(close_over_dependents(names, lock));
    }

    /// Whether the user asked for this package to move. Packages unlocked
    /// only as a consequence should stay on their locked version if they can.
    pub fn is_requested(&self, name: &str) -> bool {
        self.everything || self.requested.contains(name)
    }
}

/// Compute the unlock set.
///
/// Seeds with the requested names, packages of changed sources, packages of
/// floating branch sources, and packages whose manifest requirement no
/// longer matches the lock. The result is closed over reverse dependency
/// edges: anything depending on an unlocked package is unlocked too.
pub fn compute_unlock_set(
    request: &UpdateRequest,
    changed_sources: &BTreeSet<String>,
    manifest: &Manifest,
    lock: Option<&Lockfile>,
) -> PinionResult<UnlockSet> {
    let Some(lock) = lock else {
        if let UpdateRequest::Only(names) = request {
            validate_names(names, manifest, None)?;
        }
        return Ok(UnlockSet::all());
    };

    let mut requested = BTreeSet::new();

    match request {
        UpdateRequest::Everything => return Ok(UnlockSet::all()),
        UpdateRequest::Nothing => {}
        UpdateRequest::Only(names) => {
            validate_names(names, manifest, Some(lock))?;
            for name in names {
                requested.extend(packages_named_by(name, manifest, lock));
            }
        }
    }

    let mut seed = requested.clone();

    for source in changed_sources {
        seed.extend(lock.packages_from_source(source).map(str::to_string));
        seed.extend(manifest.packages_from_source(source).map(str::to_string));
    }

    for (name, source) in &manifest.sources {
        if source.is_floating() {
            seed.extend(lock.packages_from_source(name).map(str::to_string));
        }
    }

    for requirement in &manifest.requirements {
        if let Some(locked) = lock.package(&requirement.name) {
            if locked.source != requirement.source
                || !requirement.constraint.matches(&locked.version)
            {
                debug!(
                    "{} {} no longer satisfies {} from {}",
                    locked.name,
                    locked.version,
                    requirement.constraint,
                    requirement.origin()
                );
                seed.insert(requirement.name.clone());
            }
        }
    }

    let names = close_over_dependents(seed, lock);
    debug!("Unlocked {} packages: {:?}", names.len(), names);
    Ok(UnlockSet {
        names,
        requested,
        everything: false,
    })
}

/// Every requested name must be a known package or source
fn validate_names(names: &[String], manifest: &Manifest, lock: Option<&Lockfile>) -> PinionResult<()> {
    for name in names {
        let known = manifest.requires(name)
            || manifest.sources.contains_key(name)
            || lock.is_some_and(|l| l.package(name).is_some() || l.source(name).is_some());
        if !known {
            return Err(PinionError::InvalidRequest(name.clone()));
        }
    }
    Ok(())
}

/// A requested name may be a package, a source, or both
fn packages_named_by(name: &str, manifest: &Manifest, lock: &Lockfile) -> BTreeSet<String> {
    let mut packages = BTreeSet::new();
    if manifest.requires(name) || lock.package(name).is_some() {
        packages.insert(name.to_string());
    }
    if manifest.sources.contains_key(name) || lock.source(name).is_some() {
        packages.extend(lock.packages_from_source(name).map(str::to_string));
        packages.extend(manifest.packages_from_source(name).map(str::to_string));
    }
    packages
}

fn close_over_dependents(seed: BTreeSet<String>, lock: &Lockfile) -> BTreeSet<String> {
    let reverse = lock.dependents();
    let mut unlocked = seed.clone();
    let mut queue: VecDeque<String> = seed.into_iter().collect();

    while let Some(name) = queue.pop_front() {
        if let Some(parents) = reverse.get(name.as_str()) {
            for parent in parents {
                if unlocked.insert(parent.to_string()) {
                    queue.push_back(parent.to_string());
                }
            }
        }
    }

    unlocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::diff::changed_sources;
    use crate::lock::lockfile::{LockedPackage, LockedSource};
    use semver::{Version, VersionReq};
    use std::collections::BTreeMap;
    use std::path::Path;

    const MANIFEST: &str = r#"
[sources.default]
index = "index"

[sources.foo]
git = "/repos/foo"
branch = "omg"

[sources.bar]
git = "/repos/bar"
tag = "v1"

[dependencies]
foo = { source = "foo" }
bar = { source = "bar" }
app = ">=1"
"#;

    fn manifest(content: &str) -> Manifest {
        Manifest::parse(content, Path::new("/p/pinion.toml")).unwrap()
    }

    fn package(name: &str, version: &str, source: &str, deps: &[&str]) -> LockedPackage {
        LockedPackage {
            name: name.to_string(),
            version: Version::parse(version).unwrap(),
            source: source.to_string(),
            revision: None,
            dependencies: deps
                .iter()
                .map(|d| (d.to_string(), VersionReq::STAR))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// Lock matching MANIFEST: app -> bar -> util, foo standalone
    fn lock_for(manifest: &Manifest) -> Lockfile {
        let mut lock = Lockfile::new();
        for (name, source) in &manifest.sources {
            lock.sources
                .push(LockedSource::new(name.clone(), source.fingerprint(), None));
        }
        lock.packages = vec![
            package("app", "1.0.0", "default", &["bar"]),
            package("bar", "1.0.0", "bar", &["util"]),
            package("util", "1.0.0", "default", &[]),
            package("foo", "1.0.0", "foo", &[]),
        ];
        lock
    }

    fn unlock(request: UpdateRequest, manifest: &Manifest, lock: &Lockfile) -> PinionResult<UnlockSet> {
        let changed = changed_sources(&manifest.sources, Some(lock));
        compute_unlock_set(&request, &changed, manifest, Some(lock))
    }

    #[test]
    fn first_run_unlocks_everything() {
        let m = manifest(MANIFEST);
        let changed = changed_sources(&m.sources, None);
        let set = compute_unlock_set(&UpdateRequest::Nothing, &changed, &m, None).unwrap();
        assert!(set.is_everything());
        assert!(set.contains("anything"));
    }

    #[test]
    fn plain_run_unlocks_only_branch_packages() {
        let m = manifest(MANIFEST);
        let lock = lock_for(&m);
        let set = unlock(UpdateRequest::Nothing, &m, &lock).unwrap();
        assert!(!set.is_everything());
        assert_eq!(set.names(), &BTreeSet::from(["foo".to_string()]));
    }

    #[test]
    fn update_everything() {
        let m = manifest(MANIFEST);
        let lock = lock_for(&m);
        let set = unlock(UpdateRequest::from_names(vec![]), &m, &lock).unwrap();
        assert!(set.is_everything());
    }

    #[test]
    fn scoped_update_unlocks_dependents_only() {
        let m = manifest(MANIFEST);
        let lock = lock_for(&m);
        let set = unlock(UpdateRequest::Only(vec!["util".to_string()]), &m, &lock).unwrap();
        assert!(set.contains("util"));
        assert!(set.contains("bar"));
        assert!(set.contains("app"));
        // foo floats on a branch, so it is always unlocked
        assert!(set.contains("foo"));
    }

    #[test]
    fn source_name_unlocks_its_packages() {
        let m = manifest(MANIFEST);
        let lock = lock_for(&m);
        let set = unlock(UpdateRequest::Only(vec!["bar".to_string()]), &m, &lock).unwrap();
        assert!(set.contains("bar"));
        assert!(set.contains("app"));
        assert!(!set.contains("util"));
        assert!(set.is_requested("bar"));
        assert!(!set.is_requested("app"));
    }

    #[test]
    fn late_unlock_closes_over_dependents() {
        let m = manifest(MANIFEST);
        let lock = lock_for(&m);
        let mut set = unlock(UpdateRequest::Nothing, &m, &lock).unwrap();
        assert!(!set.contains("util"));

        set.unlock(BTreeSet::from(["util".to_string()]), &lock);
        assert!(set.contains("util"));
        assert!(set.contains("bar"));
        assert!(set.contains("app"));
        assert!(!set.is_requested("util"));
    }

    #[test]
    fn unknown_name_is_rejected() {
        let m = manifest(MANIFEST);
        let lock = lock_for(&m);
        let err = unlock(UpdateRequest::Only(vec!["nope".to_string()]), &m, &lock).unwrap_err();
        assert!(matches!(err, PinionError::InvalidRequest(ref n) if n == "nope"));
    }

    #[test]
    fn unknown_name_rejected_without_lockfile() {
        let m = manifest(MANIFEST);
        let changed = changed_sources(&m.sources, None);
        let request = UpdateRequest::Only(vec!["nope".to_string()]);
        assert!(compute_unlock_set(&request, &changed, &m, None).is_err());
    }

    #[test]
    fn changed_source_unlocks_packages_and_dependents() {
        let m = manifest(MANIFEST);
        let lock = lock_for(&m);
        let moved = manifest(&MANIFEST.replace("/repos/bar", "/repos/bar_two"));
        let set = unlock(UpdateRequest::Nothing, &moved, &lock).unwrap();
        assert!(set.contains("bar"));
        assert!(set.contains("app"));
        assert!(!set.contains("util"));
    }

    #[test]
    fn requirement_drift_unlocks_package() {
        let m = manifest(MANIFEST);
        let lock = lock_for(&m);
        let bumped = manifest(&MANIFEST.replace("app = \">=1\"", "app = \">=2\""));
        let set = unlock(UpdateRequest::Nothing, &bumped, &lock).unwrap();
        assert!(set.contains("app"));
        assert!(!set.contains("bar"));
    }
}
