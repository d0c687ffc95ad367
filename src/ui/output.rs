//! Output functions for consistent CLI formatting

use super::context::UiContext;
use console::style;

/// Display success outro
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("{}", message);
    }
}

/// Display a success step
pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        println!("  {} {}", style("[OK]").green(), message);
    }
}

/// Display a success step with detail
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(format!("{} ({})", message, style(detail).dim())).ok();
    } else {
        println!("  {} {} ({})", style("[OK]").green(), message, detail);
    }
}

/// Display a warning step with hint
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(format!("{} - {}", message, style(hint).dim())).ok();
    } else {
        println!("  {} {} - {}", style("[WARN]").yellow(), message, hint);
    }
}

/// Display an info step
pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        println!("  {} {}", style("[INFO]").cyan(), message);
    }
}

/// A repository that needed a network fetch
pub fn step_fetch(ctx: &UiContext, url: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::step(format!("Fetching {}", style(url).cyan())).ok();
    } else {
        println!("Fetching {}", url);
    }
}

/// A package in the resolved lock
pub fn step_using(ctx: &UiContext, name: &str, version: &str, from: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(format!(
            "Using {} ({}) {}",
            style(name).bold(),
            version,
            style(format!("from {}", from)).dim()
        ))
        .ok();
    } else {
        println!("Using {} ({}) from {}", name, version, from);
    }
}
