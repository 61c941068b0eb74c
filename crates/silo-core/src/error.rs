//! Store-level error types.

use std::io;

use silo_schema::{CONTAINER_VERSION, DecodeError, SolvableId};

/// Failure while reading or writing a binary container.
///
/// Fatal to the load or store operation as a whole. A failed load leaves
/// the pool's repo list untouched; no partially populated repo is ever
/// attached.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The stream does not start with the container magic.
    #[error("not a silo container (bad magic)")]
    BadMagic,

    /// The stream declares a version this reader does not speak.
    #[error("unsupported container version {0}, expected {CONTAINER_VERSION}")]
    UnsupportedVersion(u8),

    /// The stream ended before the declared structures did.
    #[error("truncated container while reading {section}")]
    Truncated {
        /// Section being parsed when input ran out.
        section: &'static str,
    },

    /// The stream is structurally invalid.
    #[error("corrupt container: {0}")]
    Corrupt(String),

    /// An embedded value failed to decode.
    #[error("value decode failed: {0}")]
    Value(#[from] DecodeError),
}

/// Failure while mutating the attribute store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The addressed repo does not exist in this pool.
    #[error("no such repo")]
    NoRepo,

    /// The addressed repodata block does not exist.
    #[error("no such repodata block {0}")]
    NoBlock(usize),

    /// The addressed solvable does not exist or has been removed.
    #[error("no such solvable {}", .0.as_u32())]
    NoSolvable(SolvableId),

    /// The value's type disagreed with the key's declared type.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
