//! Version parsing helpers
//!
//! Versions and requirements are `semver` types. Package metadata often
//! writes short versions like `1.0`, so parsing pads missing components.

use semver::{Version, VersionReq};

/// Parse a version, accepting `1` and `1.2` as `1.0.0` and `1.2.0`
pub fn parse_version(input: &str) -> Result<Version, String> {
    let trimmed = input.trim();
    if let Ok(v) = Version::parse(trimmed) {
        return Ok(v);
    }

    // Split off pre-release/build suffix before padding the numeric core
    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split);
    let parts = core.split('.').count();
    if core.is_empty() || parts > 3 {
        return Err(format!("invalid version '{}'", input));
    }

    let padded = format!("{}{}{}", core, ".0".repeat(3 - parts), suffix);
    Version::parse(&padded).map_err(|e| format!("invalid version '{}': {}", input, e))
}

/// Parse a version requirement; empty means any version.
///
/// A bare version keeps semver's caret meaning: `1.2` allows `>=1.2.0, <2.0.0`.
/// Use `=1.2` to hold a package to one release line.
pub fn parse_requirement(input: &str) -> Result<VersionReq, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(VersionReq::STAR);
    }
    VersionReq::parse(trimmed).map_err(|e| format!("invalid requirement '{}': {}", input, e))
}
