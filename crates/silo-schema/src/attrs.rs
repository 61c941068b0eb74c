//! Well-known attribute key names.
//!
//! Attribute keys are free-form `(name, type)` pairs, but producers and
//! consumers have to agree on spellings for the common package metadata.
//! The `solvable:` prefix marks per-package attributes.

/// One-line package summary.
pub const SUMMARY: &str = "solvable:summary";

/// Long package description.
pub const DESCRIPTION: &str = "solvable:description";

/// Package group, e.g. `Applications/Office`.
pub const GROUP: &str = "solvable:group";

/// SPDX-ish license string.
pub const LICENSE: &str = "solvable:license";

/// Build timestamp (seconds since the epoch).
pub const BUILDTIME: &str = "solvable:buildtime";

/// Compressed download size in bytes.
pub const DOWNLOADSIZE: &str = "solvable:downloadsize";

/// Installed size in bytes.
pub const INSTALLSIZE: &str = "solvable:installsize";

/// Dependency list: names this package requires.
pub const REQUIRES: &str = "solvable:requires";

/// Dependency list: names this package provides.
pub const PROVIDES: &str = "solvable:provides";

/// Dependency list: names this package conflicts with.
pub const CONFLICTS: &str = "solvable:conflicts";

/// Dependency list: names this package obsoletes.
pub const OBSOLETES: &str = "solvable:obsoletes";

/// Checksum of the package payload.
pub const CHECKSUM: &str = "solvable:checksum";

/// File list as (directory, basename) pairs.
pub const FILELIST: &str = "solvable:filelist";
