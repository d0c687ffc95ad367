//! Lock state: the lockfile model, drift detection, unlock calculation,
//! and atomic persistence.

pub mod diff;
pub mod lockfile;
pub mod unlock;
pub mod writer;

pub use diff::changed_sources;
pub use lockfile::{current_platform, LockedPackage, LockedSource, Lockfile, LOCKFILE_NAME};
pub use unlock::{compute_unlock_set, UnlockSet, UpdateRequest};
pub use writer::{write_lockfile, WriteOutcome};
