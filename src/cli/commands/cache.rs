//! Cache command - list or clear git mirrors and checkouts

use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::PinionResult;
use crate::git::cache::{clear, list_entries, CacheEntry};
use crate::git::CacheLock;
use crate::ui::{self, UiContext};
use console::style;
use std::path::Path;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> PinionResult<()> {
    let root = ConfigManager::cache_dir(config);

    match args.action {
        CacheAction::List { format } => list_caches(&root, format).await,
        CacheAction::Clear => clear_caches(&root).await,
    }
}

async fn list_caches(root: &Path, format: OutputFormat) -> PinionResult<()> {
    let entries = list_entries(root).await?;

    match format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Table if entries.is_empty() => {
            let ctx = UiContext::detect();
            ui::step_info(&ctx, &format!("No cached repositories in {}", root.display()));
        }
        OutputFormat::Table => print_table(&entries),
    }

    Ok(())
}

fn print_json(entries: &[CacheEntry]) -> PinionResult<()> {
    let json = serde_json::to_string_pretty(entries)?;
    println!("{}", json);
    Ok(())
}

fn print_table(entries: &[CacheEntry]) {
    println!(
        "{:<10} {:<60}",
        style("KIND").bold(),
        style("NAME").bold()
    );
    println!("{}", "-".repeat(70));

    for entry in entries {
        let kind = match entry.kind {
            "mirror" => style(entry.kind).cyan(),
            _ => style(entry.kind).dim(),
        };
        println!("{:<10} {:<60}", kind, entry.name);
    }

    println!();
    println!("Total: {} cache entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
}

async fn clear_caches(root: &Path) -> PinionResult<()> {
    let ctx = UiContext::detect();
    // Don't pull trees out from under a running install
    let _lock = CacheLock::acquire(root).await?;
    let removed = clear(root).await?;
    ui::step_ok(&ctx, &format!("Removed {} cache entries", removed));
    Ok(())
}
