//! Value-level decode errors.

use crate::types::{ChecksumKind, TypeTag};

/// Failure while decoding a single encoded value.
///
/// A decode error is fatal for the lookup that triggered it but never
/// corrupts the rest of the store. Missing values are *not* errors; they
/// are represented as `Ok(None)` by the lookup operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The byte region ended before the value did.
    #[error("truncated value: needed {needed} more byte(s) at offset {offset}")]
    Truncated {
        /// Offset into the region where input ran out.
        offset: usize,
        /// Number of bytes still required.
        needed: usize,
    },

    /// A variable-length integer did not fit in 64 bits.
    #[error("varint does not fit in 64 bits")]
    VarintOverflow,

    /// An integer value exceeded the width declared by its key.
    #[error("integer value does not fit in 32 bits")]
    IntOutOfRange,

    /// Unknown type tag on the wire.
    #[error("unknown type tag {0}")]
    InvalidTag(u8),

    /// Unknown checksum kind on the wire.
    #[error("unknown checksum kind {0}")]
    InvalidChecksumKind(u8),

    /// A string reference pointed outside the string table.
    #[error("string reference {0} is out of range")]
    BadStringRef(u32),

    /// A key reference pointed outside its block's key table.
    #[error("key reference {0} is out of range")]
    BadKeyRef(u32),

    /// An inline string was not valid UTF-8.
    #[error("string value is not valid UTF-8")]
    InvalidUtf8,

    /// A stored digest length disagreed with its checksum kind.
    #[error("checksum length {got} does not match {kind} digest size {expected}")]
    ChecksumLength {
        /// Declared checksum kind.
        kind: ChecksumKind,
        /// Digest size the kind mandates.
        expected: usize,
        /// Length actually stored.
        got: usize,
    },

    /// A value's type disagreed with the type its key declares.
    #[error("value type mismatch: key expects {expected}, got {got}")]
    TypeMismatch {
        /// Type declared by the key.
        expected: TypeTag,
        /// Type of the offered or stored value.
        got: TypeTag,
    },
}
