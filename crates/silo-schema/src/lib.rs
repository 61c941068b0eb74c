//! Shared types and wire format for the silo metadata store.
//!
//! This crate defines everything the container format and the in-memory
//! store agree on: interned identifiers, type tags, the typed value model,
//! the varint wire primitives, and the value codec. The engine that owns
//! pools, repositories and attribute blocks lives in `silo-core`; both the
//! producer (writer) and the consumer (reader) of a container depend only
//! on the definitions here.

pub mod attrs;
pub mod codec;
pub mod error;
pub mod types;
pub mod value;
pub mod wire;

pub use codec::{StringTable, decode_value, encode_value, skip_value};
pub use error::DecodeError;
pub use types::{ChecksumKind, KeyId, SolvableId, StringId, TypeTag};
pub use value::{Checksum, DirArray, DirEntry, IdArray, Value};

/// Magic signature opening every container file.
pub const CONTAINER_MAGIC: [u8; 4] = *b"SILO";

/// Current container format version.
///
/// Readers reject any other version outright rather than attempting a
/// best-effort parse.
pub const CONTAINER_VERSION: u8 = 1;
