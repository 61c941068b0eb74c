//! The typed attribute value model.
//!
//! Scalar values are owned outright. The array types ([`IdArray`],
//! [`DirArray`]) keep their elements in validated encoded form and decode
//! them on demand, so a consumer that breaks out of iteration early never
//! materializes the tail of a large dependency or file list.

use crate::error::DecodeError;
use crate::types::{ChecksumKind, StringId, TypeTag};
use crate::wire::{Cursor, put_uint};

/// A typed checksum digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    kind: ChecksumKind,
    digest: Vec<u8>,
}

impl Checksum {
    /// Build a checksum, validating the digest length against the kind.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::ChecksumLength`] if `digest` is not exactly
    /// the size the kind mandates.
    pub fn new(kind: ChecksumKind, digest: Vec<u8>) -> Result<Self, DecodeError> {
        if digest.len() != kind.digest_len() {
            return Err(DecodeError::ChecksumLength {
                kind,
                expected: kind.digest_len(),
                got: digest.len(),
            });
        }
        Ok(Self { kind, digest })
    }

    /// Checksum algorithm.
    pub fn kind(&self) -> ChecksumKind {
        self.kind
    }

    /// Raw digest bytes.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Digest rendered as lowercase hex.
    pub fn hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.hex())
    }
}

/// An array of string-table references, decoded lazily.
///
/// The element count is known up front; elements are pulled out of the
/// validated varint stream one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdArray {
    count: u32,
    raw: Vec<u8>,
}

impl IdArray {
    /// Build an array from already-resolved ids.
    pub fn from_ids(ids: &[StringId]) -> Self {
        let mut raw = Vec::with_capacity(ids.len());
        for id in ids {
            put_uint(&mut raw, u64::from(id.as_u32()));
        }
        Self {
            count: ids.len() as u32,
            raw,
        }
    }

    /// Wrap a validated encoded element stream.
    pub(crate) fn from_raw(count: u32, raw: Vec<u8>) -> Self {
        Self { count, raw }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate the elements, decoding each on demand.
    pub fn iter(&self) -> Ids<'_> {
        Ids {
            cur: Cursor::new(&self.raw),
            remaining: self.count,
        }
    }

    /// Encoded element stream (without the leading count).
    pub(crate) fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl<'a> IntoIterator for &'a IdArray {
    type Item = StringId;
    type IntoIter = Ids<'a>;

    fn into_iter(self) -> Ids<'a> {
        self.iter()
    }
}

/// Lazy iterator over an [`IdArray`].
#[derive(Debug, Clone)]
pub struct Ids<'a> {
    cur: Cursor<'a>,
    remaining: u32,
}

impl Iterator for Ids<'_> {
    type Item = StringId;

    fn next(&mut self) -> Option<StringId> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        // The stream was validated when the array was decoded.
        self.cur.uint32().ok().map(StringId)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Ids<'_> {}

/// One element of a file list: directory plus basename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// Directory path, as a string-table reference.
    pub dir: StringId,
    /// File basename, as a string-table reference.
    pub name: StringId,
}

/// An array of [`DirEntry`] pairs, decoded lazily.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirArray {
    count: u32,
    raw: Vec<u8>,
}

impl DirArray {
    /// Build an array from already-resolved entries.
    pub fn from_entries(entries: &[DirEntry]) -> Self {
        let mut raw = Vec::with_capacity(entries.len() * 2);
        for e in entries {
            put_uint(&mut raw, u64::from(e.dir.as_u32()));
            put_uint(&mut raw, u64::from(e.name.as_u32()));
        }
        Self {
            count: entries.len() as u32,
            raw,
        }
    }

    /// Wrap a validated encoded element stream.
    pub(crate) fn from_raw(count: u32, raw: Vec<u8>) -> Self {
        Self { count, raw }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Whether the array has no entries.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate the entries, decoding each on demand.
    pub fn iter(&self) -> DirEntries<'_> {
        DirEntries {
            cur: Cursor::new(&self.raw),
            remaining: self.count,
        }
    }

    /// Encoded element stream (without the leading count).
    pub(crate) fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl<'a> IntoIterator for &'a DirArray {
    type Item = DirEntry;
    type IntoIter = DirEntries<'a>;

    fn into_iter(self) -> DirEntries<'a> {
        self.iter()
    }
}

/// Lazy iterator over a [`DirArray`].
#[derive(Debug, Clone)]
pub struct DirEntries<'a> {
    cur: Cursor<'a>,
    remaining: u32,
}

impl Iterator for DirEntries<'_> {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let dir = self.cur.uint32().ok().map(StringId)?;
        let name = self.cur.uint32().ok().map(StringId)?;
        Some(DirEntry { dir, name })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for DirEntries<'_> {}

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// String-table reference.
    Id(StringId),
    /// UTF-8 string.
    Str(String),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// Boolean flag.
    Bool(bool),
    /// Opaque binary blob.
    Blob(Vec<u8>),
    /// Typed checksum digest.
    Checksum(Checksum),
    /// Array of string-table references.
    IdArray(IdArray),
    /// Array of (directory, basename) pairs.
    DirArray(DirArray),
}

impl Value {
    /// Type tag of this value.
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Id(_) => TypeTag::Id,
            Self::Str(_) => TypeTag::Str,
            Self::U32(_) => TypeTag::U32,
            Self::U64(_) => TypeTag::U64,
            Self::Bool(_) => TypeTag::Bool,
            Self::Blob(_) => TypeTag::Blob,
            Self::Checksum(_) => TypeTag::Checksum,
            Self::IdArray(_) => TypeTag::IdArray,
            Self::DirArray(_) => TypeTag::DirArray,
        }
    }

    /// The string-table reference, if this is an `Id` value.
    pub fn as_id(&self) -> Option<StringId> {
        match self {
            Self::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// The string, if this is a `Str` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, widened to 64 bits, if this is a `U32` or `U64` value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U32(v) => Some(u64::from(*v)),
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// The flag, if this is a `Bool` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The blob bytes, if this is a `Blob` value.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// The checksum, if this is a `Checksum` value.
    pub fn as_checksum(&self) -> Option<&Checksum> {
        match self {
            Self::Checksum(c) => Some(c),
            _ => None,
        }
    }

    /// The array, if this is an `IdArray` value.
    pub fn as_id_array(&self) -> Option<&IdArray> {
        match self {
            Self::IdArray(a) => Some(a),
            _ => None,
        }
    }

    /// The array, if this is a `DirArray` value.
    pub fn as_dir_array(&self) -> Option<&DirArray> {
        match self {
            Self::DirArray(a) => Some(a),
            _ => None,
        }
    }

    /// Visit every string-table reference held by this value.
    pub fn for_each_id(&self, mut f: impl FnMut(StringId)) {
        match self {
            Self::Id(id) => f(*id),
            Self::IdArray(a) => a.iter().for_each(f),
            Self::DirArray(a) => {
                for e in a.iter() {
                    f(e.dir);
                    f(e.name);
                }
            }
            _ => {}
        }
    }

    /// Rewrite every string-table reference through `f`.
    ///
    /// Used when moving a value between id spaces (file-local table to
    /// pool table and back).
    pub fn map_ids(self, f: &impl Fn(StringId) -> StringId) -> Self {
        match self {
            Self::Id(id) => Self::Id(f(id)),
            Self::IdArray(a) => {
                let ids: Vec<StringId> = a.iter().map(f).collect();
                Self::IdArray(IdArray::from_ids(&ids))
            }
            Self::DirArray(a) => {
                let entries: Vec<DirEntry> = a
                    .iter()
                    .map(|e| DirEntry {
                        dir: f(e.dir),
                        name: f(e.name),
                    })
                    .collect();
                Self::DirArray(DirArray::from_entries(&entries))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_validates_digest_length() {
        let c = Checksum::new(ChecksumKind::Md5, vec![0xab; 16]).unwrap();
        assert_eq!(c.hex(), "ab".repeat(16));
        assert_eq!(c.to_string(), format!("md5:{}", "ab".repeat(16)));

        let err = Checksum::new(ChecksumKind::Sha256, vec![0; 16]).unwrap_err();
        assert!(matches!(err, DecodeError::ChecksumLength { got: 16, .. }));
    }

    #[test]
    fn id_array_is_lazy_and_exact() {
        let ids: Vec<StringId> = (10..20).map(StringId).collect();
        let arr = IdArray::from_ids(&ids);
        assert_eq!(arr.len(), 10);

        // Early break touches only the head of the stream.
        let first_three: Vec<StringId> = arr.iter().take(3).collect();
        assert_eq!(first_three, vec![StringId(10), StringId(11), StringId(12)]);

        let all: Vec<StringId> = arr.iter().collect();
        assert_eq!(all, ids);
        assert_eq!(arr.iter().len(), 10);
    }

    #[test]
    fn dir_array_round_trip() {
        let entries = [
            DirEntry {
                dir: StringId(3),
                name: StringId(4),
            },
            DirEntry {
                dir: StringId(3),
                name: StringId(5),
            },
        ];
        let arr = DirArray::from_entries(&entries);
        let back: Vec<DirEntry> = arr.iter().collect();
        assert_eq!(back, entries);
    }

    #[test]
    fn map_ids_rewrites_every_reference() {
        let v = Value::IdArray(IdArray::from_ids(&[StringId(1), StringId(2)]));
        let mapped = v.map_ids(&|id| StringId(id.as_u32() + 100));
        let arr = mapped.as_id_array().unwrap();
        let ids: Vec<StringId> = arr.iter().collect();
        assert_eq!(ids, vec![StringId(101), StringId(102)]);

        let v = Value::Str("unchanged".to_string());
        assert_eq!(v.clone().map_ids(&|id| id), v);
    }

    #[test]
    fn value_accessors_match_tags() {
        assert_eq!(Value::U32(7).as_u64(), Some(7));
        assert_eq!(Value::U64(u64::MAX).as_u64(), Some(u64::MAX));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Str("x".into()).as_str(), Some("x"));
        assert_eq!(Value::Id(StringId(9)).as_id(), Some(StringId(9)));
        assert_eq!(Value::U32(7).as_str(), None);
    }
}
