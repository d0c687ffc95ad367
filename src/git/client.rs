//! Git command client
//!
//! Everything the cache needs from git goes through the [`GitClient`]
//! trait so tests can substitute a fake. The production implementation
//! shells out to the `git` binary.

use crate::error::{PinionError, PinionResult};
use crate::source::RefKind;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Namespace for refs fetched into a mirror
const MIRROR_REF_PREFIX: &str = "refs/pinion";

/// Operations the git cache performs against repositories
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Create an empty bare mirror at `mirror`
    async fn init_mirror(&self, mirror: &Path) -> PinionResult<()>;

    /// Fetch `value` of the given ref kind from `url` into the mirror and
    /// return the commit it names
    async fn fetch_ref(
        &self,
        mirror: &Path,
        url: &str,
        kind: RefKind,
        value: &str,
    ) -> PinionResult<String>;

    /// Resolve a tag or revision already present in the mirror, without
    /// touching the network
    async fn resolve_local(
        &self,
        mirror: &Path,
        kind: RefKind,
        value: &str,
    ) -> PinionResult<Option<String>>;

    /// Materialize `revision` as a working tree at `dest`
    async fn checkout(
        &self,
        mirror: &Path,
        url: &str,
        revision: &str,
        dest: &Path,
        submodules: bool,
    ) -> PinionResult<()>;
}

/// [`GitClient`] backed by the `git` command line
#[derive(Debug, Clone, Default)]
pub struct CommandGit;

impl CommandGit {
    pub fn new() -> Self {
        Self
    }

    /// Check if git is installed
    pub async fn installed() -> bool {
        Command::new("git")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run git and return stdout, failing on a non-zero exit
    async fn exec(&self, dir: Option<&Path>, args: &[&str]) -> PinionResult<String> {
        debug!("Executing: git {:?}", args);

        let mut cmd = Command::new("git");
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        let output = cmd
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PinionError::command_failed(format!("git {}", args.join(" ")), e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(PinionError::command_exec(
                format!("git {}", args.join(" ")),
                String::from_utf8_lossy(&output.stderr),
            ))
        }
    }

    async fn rev_parse(&self, mirror: &Path, spec: &str) -> PinionResult<String> {
        let commit = format!("{}^{{commit}}", spec);
        self.exec(Some(mirror), &["rev-parse", "--verify", "--quiet", &commit])
            .await
    }
}

/// Where a fetched ref lands inside the mirror
fn local_ref(kind: RefKind, value: &str) -> Option<String> {
    match kind {
        RefKind::Branch => Some(format!("{}/heads/{}", MIRROR_REF_PREFIX, value)),
        RefKind::Tag => Some(format!("refs/tags/{}", value)),
        RefKind::Default => Some(format!("{}/default", MIRROR_REF_PREFIX)),
        RefKind::Revision => None,
    }
}

/// Submodule URLs on the local filesystem need file transport enabled
fn is_local_url(url: &str) -> bool {
    url.starts_with('/') || url.starts_with("file://") || url.starts_with('.')
}

#[async_trait]
impl GitClient for CommandGit {
    async fn init_mirror(&self, mirror: &Path) -> PinionResult<()> {
        let path = mirror.display().to_string();
        self.exec(None, &["init", "--quiet", "--bare", &path]).await?;
        Ok(())
    }

    async fn fetch_ref(
        &self,
        mirror: &Path,
        url: &str,
        kind: RefKind,
        value: &str,
    ) -> PinionResult<String> {
        let refspec = match kind {
            RefKind::Branch => format!("+refs/heads/{}:{}/heads/{}", value, MIRROR_REF_PREFIX, value),
            RefKind::Tag => format!("+refs/tags/{}:refs/tags/{}", value, value),
            RefKind::Default => format!("+HEAD:{}/default", MIRROR_REF_PREFIX),
            RefKind::Revision => {
                // Arbitrary commits can't be fetched by name everywhere;
                // pull all heads and tags, then look the commit up
                let heads = format!("+refs/heads/*:{}/heads/*", MIRROR_REF_PREFIX);
                self.exec(
                    Some(mirror),
                    &["fetch", "--quiet", "--force", "--tags", url, &heads],
                )
                .await?;
                return self.rev_parse(mirror, value).await.map_err(|_| {
                    PinionError::command_exec(
                        format!("git rev-parse {}", value),
                        format!("revision {} not found in {}", value, url),
                    )
                });
            }
        };

        self.exec(
            Some(mirror),
            &["fetch", "--quiet", "--force", "--no-tags", url, &refspec],
        )
        .await?;

        match local_ref(kind, value) {
            Some(local) => self.rev_parse(mirror, &local).await,
            None => Err(PinionError::Internal(format!("no local ref for {}", kind))),
        }
    }

    async fn resolve_local(
        &self,
        mirror: &Path,
        kind: RefKind,
        value: &str,
    ) -> PinionResult<Option<String>> {
        let spec = match kind {
            RefKind::Tag => format!("refs/tags/{}", value),
            RefKind::Revision => value.to_string(),
            // Branches and the default branch float, never answer locally
            RefKind::Branch | RefKind::Default => return Ok(None),
        };
        Ok(self.rev_parse(mirror, &spec).await.ok())
    }

    async fn checkout(
        &self,
        mirror: &Path,
        url: &str,
        revision: &str,
        dest: &Path,
        submodules: bool,
    ) -> PinionResult<()> {
        let mirror_path = mirror.display().to_string();
        let dest_path = dest.display().to_string();

        self.exec(
            None,
            &["clone", "--quiet", "--no-checkout", &mirror_path, &dest_path],
        )
        .await?;
        self.exec(Some(dest), &["checkout", "--quiet", "--detach", revision])
            .await?;
        // Relative submodule URLs resolve against origin, which must be the
        // real remote rather than the mirror
        self.exec(Some(dest), &["remote", "set-url", "origin", url])
            .await?;

        if submodules {
            let mut args = Vec::new();
            if is_local_url(url) {
                args.extend(["-c", "protocol.file.allow=always"]);
            }
            args.extend(["submodule", "update", "--quiet", "--init", "--recursive"]);
            self.exec(Some(dest), &args).await?;
        }

        Ok(())
    }
}
