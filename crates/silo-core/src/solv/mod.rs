//! The binary container format reader and writer.
//!
//! A container holds exactly one repo: a header with counts, a
//! deduplicated string table, the key dictionary, the solvable core
//! fields, and one section per attached repodata block (local key table
//! followed by the page-indexed value stream). The concrete layout is
//! defined by `silo_schema` and this module together; reading is strict
//! parse-then-commit so a bad stream never leaves a half-built repo in
//! the pool.

pub(crate) mod read;
pub(crate) mod write;
