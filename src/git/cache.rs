//! Git mirror and checkout cache
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/.lock                              process-wide flock
//! <root>/mirrors/<name>-<hash>/             bare mirror per url
//! <root>/checkouts/<name>-<hash>/<rev>[+submodules]/
//! ```
//!
//! Each mirror is guarded by its own async lock from a shared arena, so
//! fetches of different urls run in parallel while two fetches of the same
//! url serialize. Ref resolutions are memoised for the lifetime of the
//! cache value, i.e. one run.

use crate::error::{PinionError, PinionResult};
use crate::git::client::GitClient;
use crate::source::RefKind;
use fs2::FileExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const MIRRORS_DIR: &str = "mirrors";
const CHECKOUTS_DIR: &str = "checkouts";
const LOCK_FILE: &str = ".lock";

type RefKey = (String, RefKind, String);

/// Per-url async locks
#[derive(Default)]
struct MirrorArena {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MirrorArena {
    fn lock_for(&self, url: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(url.to_string()).or_default().clone()
    }
}

/// Mirror and checkout cache for git sources
pub struct GitCache {
    root: PathBuf,
    client: Arc<dyn GitClient>,
    mirrors: MirrorArena,
    resolved: Mutex<HashMap<RefKey, String>>,
    network: Mutex<Vec<String>>,
}

impl GitCache {
    pub fn new(root: impl Into<PathBuf>, client: Arc<dyn GitClient>) -> Self {
        Self {
            root: root.into(),
            client,
            mirrors: MirrorArena::default(),
            resolved: Mutex::new(HashMap::new()),
            network: Mutex::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the bare mirror for a url
    pub fn mirror_path(&self, url: &str) -> PathBuf {
        self.root.join(MIRRORS_DIR).join(cache_key(url))
    }

    /// Path of the working tree for `(url, revision, submodules)`
    pub fn checkout_path(&self, url: &str, revision: &str, submodules: bool) -> PathBuf {
        let leaf = if submodules {
            format!("{}+submodules", revision)
        } else {
            revision.to_string()
        };
        self.root.join(CHECKOUTS_DIR).join(cache_key(url)).join(leaf)
    }

    /// Urls that required a network fetch this run, in first-fetch order
    pub fn network_fetches(&self) -> Vec<String> {
        self.network.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Create the bare mirror for `url` if it doesn't exist
    pub async fn ensure_mirror(&self, url: &str) -> PinionResult<PathBuf> {
        let lock = self.mirrors.lock_for(url);
        let _guard = lock.lock().await;
        self.ensure_mirror_locked(url).await
    }

    async fn ensure_mirror_locked(&self, url: &str) -> PinionResult<PathBuf> {
        let mirror = self.mirror_path(url);
        if mirror.join("HEAD").exists() {
            return Ok(mirror);
        }

        let parent = self.root.join(MIRRORS_DIR);
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| PinionError::io(format!("creating {}", parent.display()), e))?;

        let tmp = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        debug!("Creating mirror for {} at {}", url, mirror.display());
        if let Err(e) = self.client.init_mirror(&tmp).await {
            let _ = tokio::fs::remove_dir_all(&tmp).await;
            return Err(e);
        }
        rename_into_place(&tmp, &mirror).await?;
        Ok(mirror)
    }

    /// Resolve a ref of `url` to a full commit id.
    ///
    /// Branches and the default branch always query upstream. Tags and
    /// revisions are answered from the mirror when it already has them.
    pub async fn fetch(&self, url: &str, kind: RefKind, value: &str) -> PinionResult<String> {
        let key: RefKey = (url.to_string(), kind, value.to_string());
        if let Some(revision) = self.memoised(&key) {
            debug!("Using memoised {} of {}: {}", kind.describe(value), url, revision);
            return Ok(revision);
        }

        let lock = self.mirrors.lock_for(url);
        let _guard = lock.lock().await;

        // Another task may have resolved it while we waited
        if let Some(revision) = self.memoised(&key) {
            return Ok(revision);
        }

        let reference = kind.describe(value);
        let mirror = self
            .ensure_mirror_locked(url)
            .await
            .map_err(|e| PinionError::fetch(url, &reference, &e))?;

        if matches!(kind, RefKind::Tag | RefKind::Revision) {
            let local = self
                .client
                .resolve_local(&mirror, kind, value)
                .await
                .map_err(|e| PinionError::fetch(url, &reference, &e))?;
            if let Some(revision) = local {
                debug!("Resolved {} of {} from mirror: {}", reference, url, revision);
                self.memoise(key, &revision);
                return Ok(revision);
            }
        }

        info!("Fetching {} ({})", url, reference);
        self.record_network(url);
        let revision = self
            .client
            .fetch_ref(&mirror, url, kind, value)
            .await
            .map_err(|e| PinionError::fetch(url, &reference, &e))?;

        debug!("{} of {} is {}", reference, url, revision);
        self.memoise(key, &revision);
        Ok(revision)
    }

    /// Materialize a working tree for `revision`, reusing an existing one
    pub async fn checkout(&self, url: &str, revision: &str, submodules: bool) -> PinionResult<PathBuf> {
        let dest = self.checkout_path(url, revision, submodules);
        if dest.exists() {
            debug!("Reusing checkout {}", dest.display());
            return Ok(dest);
        }

        let lock = self.mirrors.lock_for(url);
        let _guard = lock.lock().await;
        if dest.exists() {
            return Ok(dest);
        }

        let reference = RefKind::Revision.describe(revision);
        let mirror = self
            .ensure_mirror_locked(url)
            .await
            .map_err(|e| PinionError::fetch(url, &reference, &e))?;

        let parent = dest
            .parent()
            .ok_or_else(|| PinionError::Internal(format!("checkout path {} has no parent", dest.display())))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PinionError::io(format!("creating {}", parent.display()), e))?;

        let tmp = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        debug!("Checking out {} of {} into {}", revision, url, tmp.display());
        if let Err(e) = self
            .client
            .checkout(&mirror, url, revision, &tmp, submodules)
            .await
        {
            let _ = tokio::fs::remove_dir_all(&tmp).await;
            return Err(PinionError::fetch(url, &reference, &e));
        }

        rename_into_place(&tmp, &dest).await?;
        Ok(dest)
    }

    fn memoised(&self, key: &RefKey) -> Option<String> {
        self.resolved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn memoise(&self, key: RefKey, revision: &str) {
        self.resolved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, revision.to_string());
    }

    fn record_network(&self, url: &str) {
        let mut network = self.network.lock().unwrap_or_else(|e| e.into_inner());
        if !network.iter().any(|u| u == url) {
            network.push(url.to_string());
        }
    }
}

/// Move a finished temp directory to its final name. If another writer got
/// there first, keep theirs.
async fn rename_into_place(tmp: &Path, dest: &Path) -> PinionResult<()> {
    match tokio::fs::rename(tmp, dest).await {
        Ok(()) => Ok(()),
        Err(_) if dest.exists() => {
            let _ = tokio::fs::remove_dir_all(tmp).await;
            Ok(())
        }
        Err(e) => {
            let _ = tokio::fs::remove_dir_all(tmp).await;
            Err(PinionError::io(
                format!("renaming {} -> {}", tmp.display(), dest.display()),
                e,
            ))
        }
    }
}

/// Directory name for a url: readable repo name plus a short url hash
pub fn cache_key(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let base = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches(".git");
    let name: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let name = if name.is_empty() { "repo".to_string() } else { name };

    let hash = hex::encode(Sha256::digest(url.as_bytes()));
    format!("{}-{}", name, &hash[..12])
}

/// Exclusive advisory lock on the cache root, held for a whole run
pub struct CacheLock {
    _file: File,
}

impl CacheLock {
    /// Acquire the lock, waiting for other pinion processes if needed
    pub async fn acquire(root: &Path) -> PinionResult<Self> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| PinionError::io(format!("creating cache dir {}", root.display()), e))?;

        let path = root.join(LOCK_FILE);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| PinionError::io(format!("opening {}", path.display()), e))?;

        if file.try_lock_exclusive().is_ok() {
            return Ok(Self { _file: file });
        }

        info!("Waiting for another pinion process to release {}", path.display());
        let file = tokio::task::spawn_blocking(move || file.lock_exclusive().map(|()| file))
            .await
            .map_err(|e| PinionError::Internal(format!("cache lock task failed: {}", e)))?
            .map_err(|e| PinionError::io(format!("locking {}", path.display()), e))?;

        Ok(Self { _file: file })
    }
}

/// One cached mirror or checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub kind: &'static str,
    pub name: String,
    pub path: PathBuf,
}

/// List cached mirrors and checkouts under `root`
pub async fn list_entries(root: &Path) -> PinionResult<Vec<CacheEntry>> {
    let mut entries = Vec::new();

    for name in dir_names(&root.join(MIRRORS_DIR)).await? {
        entries.push(CacheEntry {
            kind: "mirror",
            path: root.join(MIRRORS_DIR).join(&name),
            name,
        });
    }

    for repo in dir_names(&root.join(CHECKOUTS_DIR)).await? {
        let repo_dir = root.join(CHECKOUTS_DIR).join(&repo);
        for rev in dir_names(&repo_dir).await? {
            entries.push(CacheEntry {
                kind: "checkout",
                name: format!("{}/{}", repo, rev),
                path: repo_dir.join(rev),
            });
        }
    }

    Ok(entries)
}

/// Remove every mirror and checkout; returns how many were removed
pub async fn clear(root: &Path) -> PinionResult<usize> {
    let count = list_entries(root).await?.len();
    for dir in [MIRRORS_DIR, CHECKOUTS_DIR] {
        let path = root.join(dir);
        if path.exists() {
            tokio::fs::remove_dir_all(&path)
                .await
                .map_err(|e| PinionError::io(format!("removing {}", path.display()), e))?;
        }
    }
    info!("Removed {} cache entries from {}", count, root.display());
    Ok(count)
}

/// Sorted names of visible subdirectories; a missing directory is empty
async fn dir_names(dir: &Path) -> PinionResult<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PinionError::io(format!("reading {}", dir.display()), e))?;

    let mut names = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| PinionError::io(format!("reading {}", dir.display()), e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') && entry.path().is_dir() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
