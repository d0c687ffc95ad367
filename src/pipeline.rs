//! The install/update pipeline
//!
//! manifest + prior lock -> changed sources -> unlock set -> fetch
//! (concurrent, bounded) -> resolve -> canonical lockfile -> atomic write.
//!
//! Nothing is written unless every stage succeeds.

use crate::error::{PinionError, PinionResult};
use crate::git::{CacheLock, GitCache, GitClient};
use crate::lock::{
    changed_sources, compute_unlock_set, current_platform, write_lockfile, LockedPackage,
    LockedSource, Lockfile, UnlockSet, UpdateRequest, WriteOutcome,
};
use crate::manifest::Manifest;
use crate::resolve::{Candidate, CandidateSet, Resolver};
use crate::source::{read_index, scan_tree, RefKind, Source};
use futures_util::future::try_join_all;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Inputs for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub manifest_path: PathBuf,
    pub lock_path: PathBuf,
    pub cache_dir: PathBuf,
    /// Maximum concurrent source fetches
    pub jobs: usize,
    /// Platforms recorded in addition to the current one
    pub extra_platforms: Vec<String>,
    pub request: UpdateRequest,
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub lockfile: Lockfile,
    pub write: WriteOutcome,
    pub unlocked: UnlockSet,
    /// Urls that needed a network fetch
    pub fetched: Vec<String>,
    /// Human-readable description of each source, by name
    pub sources: BTreeMap<String, String>,
}

/// One source's contribution to the candidate pool
struct Enumerated {
    name: String,
    candidates: Vec<Candidate>,
    revision: Option<String>,
    index: bool,
}

/// Runs the pipeline against a git client
pub struct Pipeline {
    client: Arc<dyn GitClient>,
}

impl Pipeline {
    pub fn new(client: Arc<dyn GitClient>) -> Self {
        Self { client }
    }

    pub async fn run(&self, options: &RunOptions) -> PinionResult<RunOutcome> {
        let _cache_lock = CacheLock::acquire(&options.cache_dir).await?;

        let manifest = Manifest::from_file(&options.manifest_path).await?;
        let prior = Lockfile::load(&options.lock_path).await?;

        let changed = changed_sources(&manifest.sources, prior.as_ref());
        let mut unlocked = compute_unlock_set(&options.request, &changed, &manifest, prior.as_ref())?;
        debug!(
            "{} sources changed, unlocking {}",
            changed.len(),
            if unlocked.is_everything() {
                "everything".to_string()
            } else {
                format!("{:?}", unlocked.names())
            }
        );

        let cache = GitCache::new(&options.cache_dir, self.client.clone());
        let enumerated = self
            .enumerate(&manifest, prior.as_ref(), &changed, &unlocked, &cache, options.jobs)
            .await?;

        if let Some(prior) = &prior {
            unlocked.unlock(moved_packages(&enumerated, prior, &changed), prior);
        }

        let mut revisions = BTreeMap::new();
        let mut candidates = CandidateSet::new();
        for source in enumerated {
            if source.index {
                candidates.add_index_source(&source.name);
            } else {
                candidates.add_source(&source.name);
            }
            for candidate in source.candidates {
                candidates.add(candidate);
            }
            if let Some(revision) = source.revision {
                revisions.insert(source.name, revision);
            }
        }

        let mut preferred = BTreeMap::new();
        if let Some(prior) = &prior {
            pin_retained(&mut candidates, &mut preferred, prior, &manifest, &unlocked);
        }

        let resolution = Resolver::new(&candidates, &preferred).resolve(&manifest.requirements)?;

        let lockfile = build_lockfile(&manifest, prior.as_ref(), &revisions, resolution, options);
        let write = write_lockfile(&lockfile, &options.lock_path).await?;

        let sources = manifest
            .sources
            .iter()
            .map(|(name, source)| {
                (name.clone(), describe_source(source, revisions.get(name).map(String::as_str)))
            })
            .collect();

        Ok(RunOutcome {
            lockfile,
            write,
            unlocked,
            fetched: cache.network_fetches(),
            sources,
        })
    }

    /// Fetch and enumerate every declared source, at most `jobs` at a time
    async fn enumerate(
        &self,
        manifest: &Manifest,
        prior: Option<&Lockfile>,
        changed: &BTreeSet<String>,
        unlocked: &UnlockSet,
        cache: &GitCache,
        jobs: usize,
    ) -> PinionResult<Vec<Enumerated>> {
        let semaphore = Arc::new(Semaphore::new(jobs.max(1)));

        let tasks = manifest.sources.iter().map(|(name, source)| {
            let semaphore = semaphore.clone();
            let pinned_revision = prior
                .filter(|_| !changed.contains(name))
                .and_then(|lock| retained_revision(lock, name, manifest, unlocked));

            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| PinionError::Internal(format!("fetch semaphore closed: {}", e)))?;
                enumerate_source(name, source, pinned_revision, cache).await
            }
        });

        try_join_all(tasks).await
    }
}

/// Packages a changed source now offers that are locked from another source
fn moved_packages(
    enumerated: &[Enumerated],
    prior: &Lockfile,
    changed: &BTreeSet<String>,
) -> BTreeSet<String> {
    enumerated
        .iter()
        .filter(|source| changed.contains(&source.name))
        .flat_map(|source| {
            source.candidates.iter().filter_map(|c| {
                prior
                    .package(&c.name)
                    .filter(|locked| locked.source != source.name)
                    .map(|_| c.name.clone())
            })
        })
        .collect()
}

/// The locked revision of a git source, if none of its packages are unlocked
fn retained_revision(
    lock: &Lockfile,
    source: &str,
    manifest: &Manifest,
    unlocked: &UnlockSet,
) -> Option<String> {
    let any_unlocked = lock
        .packages_from_source(source)
        .chain(manifest.packages_from_source(source))
        .any(|name| unlocked.contains(name));
    if any_unlocked {
        return None;
    }
    lock.source(source).and_then(|s| s.revision.clone())
}

async fn enumerate_source(
    name: &str,
    source: &Source,
    pinned_revision: Option<String>,
    cache: &GitCache,
) -> PinionResult<Enumerated> {
    match source {
        Source::Index(index) => {
            let specs = read_index(&index.location).await?;
            Ok(Enumerated {
                name: name.to_string(),
                candidates: specs
                    .into_iter()
                    .map(|spec| Candidate::from_spec(spec, name, None))
                    .collect(),
                revision: None,
                index: true,
            })
        }
        Source::Path(path) => {
            let found = scan_tree(&path.path).await?;
            Ok(Enumerated {
                name: name.to_string(),
                candidates: found
                    .into_iter()
                    .map(|(_, spec)| Candidate::from_spec(spec, name, None))
                    .collect(),
                revision: None,
                index: false,
            })
        }
        Source::Git(git) => {
            let revision = match pinned_revision {
                Some(revision) => {
                    debug!("Source {} stays at {}", name, revision);
                    cache.fetch(&git.url, RefKind::Revision, &revision).await?
                }
                None => cache.fetch(&git.url, git.ref_kind, &git.ref_value).await?,
            };

            let tree = cache.checkout(&git.url, &revision, git.submodules).await?;
            let found = scan_tree(&tree).await?;
            info!("{} packages in {} at {}", found.len(), git.url, short_rev(&revision));

            Ok(Enumerated {
                name: name.to_string(),
                candidates: found
                    .into_iter()
                    .map(|(_, spec)| Candidate::from_spec(spec, name, Some(&revision)))
                    .collect(),
                revision: Some(revision),
                index: false,
            })
        }
    }
}

/// Pin every still-required, still-locked package and record preferred
/// versions for the ones that are unlocked but weren't asked to move
fn pin_retained(
    candidates: &mut CandidateSet,
    preferred: &mut BTreeMap<String, Version>,
    prior: &Lockfile,
    manifest: &Manifest,
    unlocked: &UnlockSet,
) {
    for locked in &prior.packages {
        if !manifest.sources.contains_key(&locked.source) {
            continue;
        }
        if unlocked.contains(&locked.name) {
            if !unlocked.is_requested(&locked.name) {
                preferred.insert(locked.name.clone(), locked.version.clone());
            }
            continue;
        }
        candidates.pin(Candidate {
            name: locked.name.clone(),
            version: locked.version.clone(),
            source: locked.source.clone(),
            revision: locked.revision.clone(),
            dependencies: locked.dependencies.clone(),
            pinned: true,
        });
    }
}

fn build_lockfile(
    manifest: &Manifest,
    prior: Option<&Lockfile>,
    revisions: &BTreeMap<String, String>,
    resolution: BTreeMap<String, Candidate>,
    options: &RunOptions,
) -> Lockfile {
    let mut lock = Lockfile::new();

    let mut platforms: BTreeSet<String> = prior
        .map(|p| p.platforms.iter().cloned().collect())
        .unwrap_or_default();
    platforms.insert(current_platform());
    platforms.extend(options.extra_platforms.iter().cloned());
    lock.platforms = platforms.into_iter().collect();

    lock.sources = manifest
        .sources
        .iter()
        .map(|(name, source)| {
            LockedSource::new(name.clone(), source.fingerprint(), revisions.get(name).cloned())
        })
        .collect();

    lock.packages = resolution
        .into_values()
        .map(|c| LockedPackage {
            name: c.name,
            version: c.version,
            source: c.source,
            revision: c.revision,
            dependencies: c.dependencies,
        })
        .collect();

    lock.canonicalize();
    lock
}

/// e.g. `https://x/foo.git (at omg@1a2b3c4)`
pub fn describe_source(source: &Source, revision: Option<&str>) -> String {
    match (source, revision) {
        (Source::Git(git), Some(rev)) => {
            let at = match git.ref_kind {
                RefKind::Default => short_rev(rev).to_string(),
                _ => format!("{}@{}", git.ref_value, short_rev(rev)),
            };
            format!("{} (at {})", git.url, at)
        }
        _ => source.to_string(),
    }
}

fn short_rev(revision: &str) -> &str {
    revision.get(..7).unwrap_or(revision)
}
