//! Source fingerprint differencing
//!
//! Compares what the manifest declares against what the lockfile was
//! resolved with. A changed source is one whose identity differs, was
//! added, or was removed.

use crate::lock::lockfile::Lockfile;
use crate::source::Source;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Names of sources whose fingerprint differs from the lockfile.
///
/// Without a prior lockfile every declared source counts as changed.
pub fn changed_sources(
    declared: &BTreeMap<String, Source>,
    lock: Option<&Lockfile>,
) -> BTreeSet<String> {
    let Some(lock) = lock else {
        return declared.keys().cloned().collect();
    };

    let mut changed = BTreeSet::new();

    for (name, source) in declared {
        let current = source.fingerprint();
        match lock.source(name) {
            Some(locked) if locked.fingerprint().same_identity(&current) => {}
            Some(_) => {
                debug!("Source {} changed since the lockfile was written", name);
                changed.insert(name.clone());
            }
            None => {
                debug!("Source {} is new", name);
                changed.insert(name.clone());
            }
        }
    }

    for locked in &lock.sources {
        if !declared.contains_key(&locked.name) {
            debug!("Source {} was removed from the manifest", locked.name);
            changed.insert(locked.name.clone());
        }
    }

    changed
}
