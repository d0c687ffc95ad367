//! Update command - re-resolve everything or the named packages/sources

use super::install::{report, resolve};
use crate::cli::args::UpdateArgs;
use crate::config::Config;
use crate::error::PinionResult;
use crate::lock::UpdateRequest;
use std::path::Path;

/// Execute the update command
pub async fn execute(args: UpdateArgs, manifest: &Path, config: &Config) -> PinionResult<()> {
    let request = UpdateRequest::from_names(args.targets());
    let outcome = resolve(request, manifest, args.lockfile, config).await?;
    report(&outcome, "Lock updated!");
    Ok(())
}
