//! Core library for silo - pool, repo and repodata storage engine.
//!
//! A [`Pool`] owns package repositories ([`Repo`]), a shared string table
//! and the attribute key dictionary. Each repo holds an ordered sequence
//! of solvables (packages) and one or more attached [`Repodata`] blocks
//! carrying typed per-solvable attributes. Repos load from and store to
//! the binary container format defined in `silo-schema`.
//!
//! The store is built for single-writer / many-reader use inside one
//! process: reads never mutate shared state and no internal locking is
//! performed.

pub mod error;
pub mod keys;
pub mod pool;
pub mod repo;
pub mod repodata;
pub mod strings;

mod solv;

pub use error::{FormatError, StoreError};
pub use keys::{Key, KeyDict};
pub use pool::{Pool, RepoId};
pub use repo::{Repo, Solvable};
pub use repodata::{Repodata, RepodataKey};
pub use strings::StringPool;

// Re-export the schema types every caller ends up touching.
pub use silo_schema::{
    Checksum, ChecksumKind, DecodeError, DirArray, DirEntry, IdArray, KeyId, SolvableId, StringId,
    TypeTag, Value, attrs,
};
