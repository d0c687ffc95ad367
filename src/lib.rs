//! Pinion - dependency locking with first-class git sources
//!
//! Reads a manifest of named sources and requirements, resolves a
//! consistent package set and writes a deterministic lockfile. Git
//! sources are fetched into a shared bare-mirror cache and pinned to
//! exact revisions.

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod lock;
pub mod manifest;
pub mod pipeline;
pub mod resolve;
pub mod source;
pub mod ui;
pub mod version;

pub use error::{PinionError, PinionResult};
