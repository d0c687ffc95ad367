//! Install command - resolve the manifest, keeping locked versions

use crate::cli::args::InstallArgs;
use crate::config::{Config, ConfigManager};
use crate::error::PinionResult;
use crate::git::CommandGit;
use crate::lock::{UpdateRequest, WriteOutcome, LOCKFILE_NAME};
use crate::pipeline::{Pipeline, RunOptions, RunOutcome};
use crate::ui::{self, TaskSpinner, UiContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Execute the install command
pub async fn execute(args: InstallArgs, manifest: &Path, config: &Config) -> PinionResult<()> {
    let outcome = resolve(UpdateRequest::Nothing, manifest, args.lockfile, config).await?;
    report(&outcome, "Lock complete!");
    Ok(())
}

/// Run the pipeline behind a spinner
pub(crate) async fn resolve(
    request: UpdateRequest,
    manifest: &Path,
    lockfile: Option<PathBuf>,
    config: &Config,
) -> PinionResult<RunOutcome> {
    let ctx = UiContext::detect();
    let options = RunOptions {
        manifest_path: manifest.to_path_buf(),
        lock_path: lockfile.unwrap_or_else(|| default_lock_path(manifest)),
        cache_dir: ConfigManager::cache_dir(config),
        jobs: config.fetch.jobs,
        extra_platforms: config.lock.platforms.clone(),
        request,
    };

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Resolving dependencies...");

    match Pipeline::new(Arc::new(CommandGit::new())).run(&options).await {
        Ok(outcome) => {
            spinner.clear();
            Ok(outcome)
        }
        Err(e) => {
            spinner.stop_error("Resolution failed");
            Err(e)
        }
    }
}

/// Print fetched urls, every locked package and a completion line
pub(crate) fn report(outcome: &RunOutcome, done: &str) {
    let ctx = UiContext::detect();

    for url in &outcome.fetched {
        ui::step_fetch(&ctx, url);
    }

    for package in &outcome.lockfile.packages {
        let from = outcome
            .sources
            .get(&package.source)
            .map(String::as_str)
            .unwrap_or(&package.source);
        ui::step_using(&ctx, &package.name, &package.version.to_string(), from);
    }

    let count = outcome.lockfile.packages.len();
    let detail = match outcome.write {
        WriteOutcome::Written => "lockfile written",
        WriteOutcome::Unchanged => "lockfile unchanged",
    };
    ui::outro_success(
        &ctx,
        &format!("{} {} package(s) locked, {}", done, count, detail),
    );
}

/// `pinion.lock` next to the manifest
fn default_lock_path(manifest: &Path) -> PathBuf {
    manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.join(LOCKFILE_NAME))
        .unwrap_or_else(|| PathBuf::from(LOCKFILE_NAME))
}
