//! Interned identifiers and type tags.

use crate::error::DecodeError;

/// Index of an interned string in a pool's string table.
///
/// Id 0 is always the empty string; it is never handed out for real
/// content. Ids are stable for the lifetime of the pool that owns them
/// and are meaningless in any other pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StringId(pub u32);

impl StringId {
    /// The empty string, present in every string table.
    pub const EMPTY: StringId = StringId(0);

    /// Raw index value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether this is the reserved empty-string id.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Pool-wide identifier of an interned `(name, type)` attribute key.
///
/// Id 0 is the reserved null key and never resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct KeyId(pub u32);

impl KeyId {
    /// The reserved null key.
    pub const NULL: KeyId = KeyId(0);

    /// Raw id value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether this is the reserved null key.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Repo-local identifier of a solvable.
///
/// Dense, monotonically increasing, and never reused even after the
/// solvable is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SolvableId(pub u32);

impl SolvableId {
    /// Raw id value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Index into the owning repo's solvable slots.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Semantic type of an attribute value.
///
/// The discriminant doubles as the numeric type identifier on the wire,
/// so the variants must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    /// Reference into the string table.
    Id = 1,
    /// Inline or table-referenced UTF-8 string.
    Str = 2,
    /// Unsigned 32-bit integer.
    U32 = 3,
    /// Unsigned 64-bit integer.
    U64 = 4,
    /// Boolean flag.
    Bool = 5,
    /// Opaque binary blob.
    Blob = 6,
    /// Typed checksum digest.
    Checksum = 7,
    /// Array of string-table references (dependency lists).
    IdArray = 8,
    /// Array of (directory, basename) pairs (file lists).
    DirArray = 9,
}

impl TypeTag {
    /// Numeric type identifier as stored on the wire.
    pub fn type_id(self) -> u8 {
        self as u8
    }

    /// Decode a wire type identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidTag`] for an unknown identifier.
    pub fn from_type_id(id: u8) -> Result<Self, DecodeError> {
        match id {
            1 => Ok(Self::Id),
            2 => Ok(Self::Str),
            3 => Ok(Self::U32),
            4 => Ok(Self::U64),
            5 => Ok(Self::Bool),
            6 => Ok(Self::Blob),
            7 => Ok(Self::Checksum),
            8 => Ok(Self::IdArray),
            9 => Ok(Self::DirArray),
            other => Err(DecodeError::InvalidTag(other)),
        }
    }

    /// Semantic name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Str => "str",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Bool => "bool",
            Self::Blob => "blob",
            Self::Checksum => "checksum",
            Self::IdArray => "idarray",
            Self::DirArray => "dirarray",
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checksum algorithm of a [`crate::Checksum`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChecksumKind {
    /// MD5 (legacy repositories only).
    Md5 = 1,
    /// SHA-1 (legacy repositories only).
    Sha1 = 2,
    /// SHA-256.
    Sha256 = 3,
    /// SHA-512.
    Sha512 = 4,
}

impl ChecksumKind {
    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    /// Wire identifier of the kind.
    pub fn kind_id(self) -> u8 {
        self as u8
    }

    /// Decode a wire kind identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidChecksumKind`] for an unknown
    /// identifier.
    pub fn from_kind_id(id: u8) -> Result<Self, DecodeError> {
        match id {
            1 => Ok(Self::Md5),
            2 => Ok(Self::Sha1),
            3 => Ok(Self::Sha256),
            4 => Ok(Self::Sha512),
            other => Err(DecodeError::InvalidChecksumKind(other)),
        }
    }

    /// Algorithm name, e.g. `sha256`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl std::fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChecksumKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(format!("Unknown checksum kind: {s}")),
        }
    }
}
