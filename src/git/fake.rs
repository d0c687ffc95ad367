//! In-memory [`GitClient`] for tests
//!
//! Repositories are maps from refs to commit ids and from commit ids to
//! file lists. Mirrors remember which tags and commits they have seen, so
//! local resolution behaves like a real mirror across runs that share a
//! cache directory.

use crate::error::{PinionError, PinionResult};
use crate::git::client::GitClient;
use crate::source::RefKind;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Files = Vec<(String, String)>;

#[derive(Default)]
struct FakeRepo {
    refs: HashMap<(RefKind, String), String>,
    trees: HashMap<String, Files>,
    submodule_trees: HashMap<String, Files>,
}

#[derive(Default)]
struct FakeState {
    repos: HashMap<String, FakeRepo>,
    /// (mirror, tag) -> commit
    mirrored_tags: HashMap<(PathBuf, String), String>,
    /// (mirror, commit)
    mirrored_commits: HashSet<(PathBuf, String)>,
    fetches: Vec<String>,
    inits: usize,
    checkouts: usize,
}

#[derive(Default)]
pub struct FakeGit {
    state: Mutex<FakeState>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Point a ref at a commit
    pub fn set_ref(&self, url: &str, kind: RefKind, value: &str, commit: &str) {
        self.with_state(|s| {
            s.repos
                .entry(url.to_string())
                .or_default()
                .refs
                .insert((kind, value.to_string()), commit.to_string());
        });
    }

    /// Register the files of a commit
    pub fn commit(&self, url: &str, commit: &str, files: &[(&str, &str)]) {
        self.with_state(|s| {
            s.repos.entry(url.to_string()).or_default().trees.insert(
                commit.to_string(),
                files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.to_string()))
                    .collect(),
            );
        });
    }

    /// Files that only appear when submodules are checked out
    pub fn submodule_files(&self, url: &str, commit: &str, files: &[(&str, &str)]) {
        self.with_state(|s| {
            s.repos
                .entry(url.to_string())
                .or_default()
                .submodule_trees
                .insert(
                    commit.to_string(),
                    files
                        .iter()
                        .map(|(p, c)| (p.to_string(), c.to_string()))
                        .collect(),
                );
        });
    }

    /// Network fetches made against `url`
    pub fn fetch_count(&self, url: &str) -> usize {
        self.with_state(|s| s.fetches.iter().filter(|u| *u == url).count())
    }

    pub fn init_count(&self) -> usize {
        self.with_state(|s| s.inits)
    }

    pub fn checkout_count(&self) -> usize {
        self.with_state(|s| s.checkouts)
    }
}

fn not_found(what: String) -> PinionError {
    PinionError::command_exec("git fetch", format!("fatal: couldn't find remote ref {}", what))
}

#[async_trait]
impl GitClient for FakeGit {
    async fn init_mirror(&self, mirror: &Path) -> PinionResult<()> {
        tokio::fs::create_dir_all(mirror)
            .await
            .map_err(|e| PinionError::io("creating fake mirror", e))?;
        tokio::fs::write(mirror.join("HEAD"), "ref: refs/heads/main\n")
            .await
            .map_err(|e| PinionError::io("writing fake HEAD", e))?;
        self.with_state(|s| s.inits += 1);
        Ok(())
    }

    async fn fetch_ref(
        &self,
        mirror: &Path,
        url: &str,
        kind: RefKind,
        value: &str,
    ) -> PinionResult<String> {
        self.with_state(|s| -> PinionResult<String> {
            s.fetches.push(url.to_string());
            let repo = s
                .repos
                .get(url)
                .ok_or_else(|| not_found(format!("{} in {}", value, url)))?;

            let commit = match kind {
                RefKind::Revision => repo
                    .trees
                    .keys()
                    .find(|c| c.starts_with(value))
                    .cloned()
                    .ok_or_else(|| not_found(value.to_string()))?,
                _ => repo
                    .refs
                    .get(&(kind, value.to_string()))
                    .cloned()
                    .ok_or_else(|| not_found(value.to_string()))?,
            };

            if kind == RefKind::Tag {
                s.mirrored_tags
                    .insert((mirror.to_path_buf(), value.to_string()), commit.clone());
            }
            s.mirrored_commits
                .insert((mirror.to_path_buf(), commit.clone()));
            Ok(commit)
        })
    }

    async fn resolve_local(
        &self,
        mirror: &Path,
        kind: RefKind,
        value: &str,
    ) -> PinionResult<Option<String>> {
        Ok(self.with_state(|s| match kind {
            RefKind::Tag => s
                .mirrored_tags
                .get(&(mirror.to_path_buf(), value.to_string()))
                .cloned(),
            RefKind::Revision => s
                .mirrored_commits
                .iter()
                .find(|(m, c)| m == mirror && c.starts_with(value))
                .map(|(_, c)| c.clone()),
            RefKind::Branch | RefKind::Default => None,
        }))
    }

    async fn checkout(
        &self,
        _mirror: &Path,
        url: &str,
        revision: &str,
        dest: &Path,
        submodules: bool,
    ) -> PinionResult<()> {
        let files = self.with_state(|s| {
            let repo = s.repos.get(url)?;
            let mut files = repo.trees.get(revision)?.clone();
            if submodules {
                if let Some(extra) = repo.submodule_trees.get(revision) {
                    files.extend(extra.iter().cloned());
                }
            }
            s.checkouts += 1;
            Some(files)
        });

        let files = files.ok_or_else(|| {
            PinionError::command_exec(
                "git checkout",
                format!("fatal: reference is not a tree: {}", revision),
            )
        })?;

        for (path, content) in files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PinionError::io("creating fake checkout", e))?;
            }
            tokio::fs::write(&target, content)
                .await
                .map_err(|e| PinionError::io("writing fake checkout", e))?;
        }
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| PinionError::io("creating fake checkout", e))?;
        Ok(())
    }
}
