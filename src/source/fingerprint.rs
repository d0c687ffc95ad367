//! Source identity fingerprints

use super::{RefKind, SourceKind};
use serde::{Deserialize, Serialize};

/// Identity-relevant configuration of a source.
///
/// The resolved revision of a git source is deliberately absent: it is
/// derived from the ref, not part of what the user declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub kind: SourceKind,
    /// Index directory, path, or git url
    pub location: String,
    pub ref_kind: Option<RefKind>,
    pub ref_value: Option<String>,
    pub submodules: bool,
}

impl Fingerprint {
    /// Field-wise identity comparison.
    ///
    /// The ref value is ignored for branch sources; those are re-resolved
    /// on every run regardless, so a renamed branch is still picked up.
    pub fn same_identity(&self, other: &Fingerprint) -> bool {
        if self.kind != other.kind
            || self.location != other.location
            || self.ref_kind != other.ref_kind
            || self.submodules != other.submodules
        {
            return false;
        }
        self.ref_kind == Some(RefKind::Branch) || self.ref_value == other.ref_value
    }
}
