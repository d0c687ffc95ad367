//! Git sources: command client, mirror cache and checkouts

pub mod cache;
pub mod client;
#[cfg(test)]
pub(crate) mod fake;

pub use cache::{CacheEntry, CacheLock, GitCache};
pub use client::{CommandGit, GitClient};
