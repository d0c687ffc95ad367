//! Atomic lockfile writes
//!
//! The new lockfile is rendered fully in memory, written to a temporary
//! file beside the target, synced, and renamed over the old one. A crash
//! mid-write leaves the previous lockfile untouched.

use crate::error::{PinionError, PinionResult};
use crate::lock::lockfile::Lockfile;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Outcome of a lockfile write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// File content changed (or the file was created)
    Written,
    /// Canonical text matched the existing file; nothing touched
    Unchanged,
}

/// Write a lockfile in canonical form, atomically
pub async fn write_lockfile(lock: &Lockfile, path: &Path) -> PinionResult<WriteOutcome> {
    let content = lock.to_canonical_string()?;

    if let Ok(existing) = tokio::fs::read_to_string(path).await {
        if existing == content {
            debug!("Lockfile {} unchanged", path.display());
            return Ok(WriteOutcome::Unchanged);
        }
    }

    write_atomic(path, content.as_bytes()).await?;
    info!("Wrote {}", path.display());
    Ok(WriteOutcome::Written)
}

/// Replace `path` with `contents` via write-temp-then-rename
pub async fn write_atomic(path: &Path, contents: &[u8]) -> PinionResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "lockfile".to_string());
    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| PinionError::io(format!("creating {}", tmp_path.display()), e))?;
        file.write_all(contents)
            .await
            .map_err(|e| PinionError::io(format!("writing {}", tmp_path.display()), e))?;
        file.sync_all()
            .await
            .map_err(|e| PinionError::io(format!("syncing {}", tmp_path.display()), e))?;
        drop(file);

        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            PinionError::io(
                format!("renaming {} -> {}", tmp_path.display(), path.display()),
                e,
            )
        })
    }
    .await;

    if result.is_err() {
        // Best-effort cleanup; the original file is still intact
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}
