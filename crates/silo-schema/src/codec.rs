//! The value codec: typed encode / decode / skip over a byte stream.
//!
//! Every defined type round-trips exactly. Decoding is strict: a
//! truncated region, an unknown tag, or a length that disagrees with the
//! declared type is a hard [`DecodeError`], never a silent default.

use crate::error::DecodeError;
use crate::types::{ChecksumKind, StringId, TypeTag};
use crate::value::{Checksum, DirArray, IdArray, Value};
use crate::wire::{Cursor, put_bytes, put_uint};

/// Resolution interface over an interned string table.
///
/// The pool's string table implements this; the container reader and
/// writer substitute file-local tables while translating between id
/// spaces.
pub trait StringTable {
    /// Look up the string behind an id.
    fn resolve(&self, id: StringId) -> Option<&str>;

    /// Look up the id of an already-interned string.
    fn find(&self, s: &str) -> Option<StringId>;
}

/// Slice-backed table; `find` is a linear scan, intended for small
/// file-local tables only.
impl StringTable for [String] {
    fn resolve(&self, id: StringId) -> Option<&str> {
        self.get(id.as_u32() as usize).map(String::as_str)
    }

    fn find(&self, s: &str) -> Option<StringId> {
        self.iter()
            .position(|t| t == s)
            .map(|i| StringId(i as u32))
    }
}

/// Owned table; delegates to the slice-backed implementation.
impl StringTable for Vec<String> {
    fn resolve(&self, id: StringId) -> Option<&str> {
        self.as_slice().resolve(id)
    }

    fn find(&self, s: &str) -> Option<StringId> {
        self.as_slice().find(s)
    }
}

/// Append the encoded form of `value` to `out`.
///
/// A `Str` value whose contents are already present in `strings` is
/// written as a table reference instead of inline bytes.
pub fn encode_value(out: &mut Vec<u8>, value: &Value, strings: &(impl StringTable + ?Sized)) {
    match value {
        Value::Id(id) => put_uint(out, u64::from(id.as_u32())),
        Value::Str(s) => match strings.find(s) {
            Some(id) => put_uint(out, u64::from(id.as_u32()) + 1),
            None => {
                put_uint(out, 0);
                put_bytes(out, s.as_bytes());
            }
        },
        Value::U32(v) => put_uint(out, u64::from(*v)),
        Value::U64(v) => put_uint(out, *v),
        Value::Bool(b) => out.push(u8::from(*b)),
        Value::Blob(b) => put_bytes(out, b),
        Value::Checksum(c) => {
            out.push(c.kind().kind_id());
            put_bytes(out, c.digest());
        }
        Value::IdArray(a) => {
            put_uint(out, a.len() as u64);
            out.extend_from_slice(a.raw());
        }
        Value::DirArray(a) => {
            put_uint(out, a.len() as u64);
            out.extend_from_slice(a.raw());
        }
    }
}

/// Decode one value of the given type from the cursor.
///
/// Array values validate their whole element stream up front and then
/// hand out lazy iterators over it.
///
/// # Errors
///
/// Any [`DecodeError`]; the cursor position is unspecified after a
/// failure.
pub fn decode_value(
    cur: &mut Cursor<'_>,
    tag: TypeTag,
    strings: &(impl StringTable + ?Sized),
) -> Result<Value, DecodeError> {
    match tag {
        TypeTag::Id => Ok(Value::Id(StringId(cur.uint32()?))),
        TypeTag::Str => {
            let marker = cur.uint32()?;
            if marker == 0 {
                let bytes = cur.bytes()?;
                let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
                Ok(Value::Str(s.to_string()))
            } else {
                let id = StringId(marker - 1);
                let s = strings
                    .resolve(id)
                    .ok_or(DecodeError::BadStringRef(marker - 1))?;
                Ok(Value::Str(s.to_string()))
            }
        }
        TypeTag::U32 => Ok(Value::U32(cur.uint32()?)),
        TypeTag::U64 => Ok(Value::U64(cur.uint()?)),
        TypeTag::Bool => Ok(Value::Bool(cur.byte()? != 0)),
        TypeTag::Blob => Ok(Value::Blob(cur.bytes()?.to_vec())),
        TypeTag::Checksum => {
            let kind = ChecksumKind::from_kind_id(cur.byte()?)?;
            let digest = cur.bytes()?.to_vec();
            Ok(Value::Checksum(Checksum::new(kind, digest)?))
        }
        TypeTag::IdArray => {
            let count = cur.uint32()?;
            let start = cur.position();
            let mut probe = cur.clone();
            for _ in 0..count {
                probe.uint32()?;
            }
            let len = probe.position() - start;
            let raw = cur.take(len)?.to_vec();
            Ok(Value::IdArray(IdArray::from_raw(count, raw)))
        }
        TypeTag::DirArray => {
            let count = cur.uint32()?;
            let start = cur.position();
            let mut probe = cur.clone();
            for _ in 0..count {
                probe.uint32()?;
                probe.uint32()?;
            }
            let len = probe.position() - start;
            let raw = cur.take(len)?.to_vec();
            Ok(Value::DirArray(DirArray::from_raw(count, raw)))
        }
    }
}

/// Advance the cursor past one value of the given type without
/// materializing it.
///
/// # Errors
///
/// The same errors as [`decode_value`] for malformed input.
pub fn skip_value(cur: &mut Cursor<'_>, tag: TypeTag) -> Result<(), DecodeError> {
    match tag {
        TypeTag::Id | TypeTag::U32 | TypeTag::U64 => {
            cur.uint()?;
        }
        TypeTag::Str => {
            let marker = cur.uint32()?;
            if marker == 0 {
                cur.bytes()?;
            }
        }
        TypeTag::Bool => {
            cur.byte()?;
        }
        TypeTag::Blob => {
            cur.bytes()?;
        }
        TypeTag::Checksum => {
            cur.byte()?;
            cur.bytes()?;
        }
        TypeTag::IdArray => {
            let count = cur.uint32()?;
            for _ in 0..count {
                cur.uint()?;
            }
        }
        TypeTag::DirArray => {
            let count = cur.uint32()?;
            for _ in 0..count {
                cur.uint()?;
                cur.uint()?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DirEntry;

    fn table(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| (*s).to_string()).collect()
    }

    fn round_trip(value: &Value, strings: &[String]) -> Value {
        let mut buf = Vec::new();
        encode_value(&mut buf, value, strings);
        let mut cur = Cursor::new(&buf);
        let back = decode_value(&mut cur, value.tag(), strings).unwrap();
        assert!(cur.is_empty(), "decode consumed {} of {}", cur.position(), buf.len());

        // skip_value must land on the same boundary as decode_value.
        let mut cur = Cursor::new(&buf);
        skip_value(&mut cur, value.tag()).unwrap();
        assert!(cur.is_empty());

        back
    }

    #[test]
    fn scalar_round_trips() {
        let strings = table(&[""]);
        for value in [
            Value::Id(StringId(0)),
            Value::Id(StringId(123_456)),
            Value::U32(0),
            Value::U32(u32::MAX),
            Value::U64(0),
            Value::U64(u64::MAX),
            Value::Bool(false),
            Value::Bool(true),
            Value::Blob(Vec::new()),
            Value::Blob(vec![0, 1, 2, 255]),
        ] {
            assert_eq!(round_trip(&value, &strings), value);
        }
    }

    #[test]
    fn string_round_trips() {
        let strings = table(&["", "seen-before"]);

        // Unseen string goes inline.
        let inline = Value::Str("fresh".to_string());
        assert_eq!(round_trip(&inline, &strings), inline);

        // Interned string is written as a reference, decodes identically.
        let referenced = Value::Str("seen-before".to_string());
        let mut buf = Vec::new();
        encode_value(&mut buf, &referenced, &strings);
        assert_eq!(buf, vec![2]); // marker = id 1 + 1
        assert_eq!(round_trip(&referenced, &strings), referenced);

        let empty = Value::Str(String::new());
        assert_eq!(round_trip(&empty, &strings), empty);
    }

    #[test]
    fn bad_string_ref_is_an_error() {
        let strings = table(&[""]);
        let buf = vec![9]; // marker 9 -> id 8, out of range
        let mut cur = Cursor::new(&buf);
        assert_eq!(
            decode_value(&mut cur, TypeTag::Str, &strings),
            Err(DecodeError::BadStringRef(8))
        );
    }

    #[test]
    fn checksum_round_trips() {
        let strings = table(&[""]);
        let value = Value::Checksum(Checksum::new(ChecksumKind::Sha256, vec![7; 32]).unwrap());
        assert_eq!(round_trip(&value, &strings), value);
    }

    #[test]
    fn checksum_length_mismatch_is_an_error() {
        let strings = table(&[""]);
        let mut buf = Vec::new();
        buf.push(ChecksumKind::Sha256.kind_id());
        put_bytes(&mut buf, &[0; 20]); // sha1-sized digest under a sha256 kind
        let mut cur = Cursor::new(&buf);
        assert!(matches!(
            decode_value(&mut cur, TypeTag::Checksum, &strings),
            Err(DecodeError::ChecksumLength { got: 20, .. })
        ));
    }

    #[test]
    fn array_round_trips() {
        let strings = table(&[""]);
        for value in [
            Value::IdArray(IdArray::from_ids(&[])),
            Value::IdArray(IdArray::from_ids(&[StringId(42)])),
            Value::IdArray(IdArray::from_ids(&[StringId(1), StringId(500), StringId(70_000)])),
            Value::DirArray(DirArray::from_entries(&[])),
            Value::DirArray(DirArray::from_entries(&[DirEntry {
                dir: StringId(5),
                name: StringId(6),
            }])),
        ] {
            assert_eq!(round_trip(&value, &strings), value);
        }
    }

    #[test]
    fn truncated_array_is_an_error() {
        let strings = table(&[""]);
        let value = Value::IdArray(IdArray::from_ids(&[StringId(1), StringId(2), StringId(3)]));
        let mut buf = Vec::new();
        encode_value(&mut buf, &value, &strings);
        buf.pop();
        let mut cur = Cursor::new(&buf);
        assert!(matches!(
            decode_value(&mut cur, TypeTag::IdArray, &strings),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn decoded_array_is_pulled_lazily() {
        let strings = table(&[""]);
        let ids: Vec<StringId> = (0..1000).map(StringId).collect();
        let mut buf = Vec::new();
        encode_value(&mut buf, &Value::IdArray(IdArray::from_ids(&ids)), &strings);

        let mut cur = Cursor::new(&buf);
        let decoded = decode_value(&mut cur, TypeTag::IdArray, &strings).unwrap();
        let arr = decoded.as_id_array().unwrap();

        // Stop after ten elements; nothing forces the rest to decode.
        let head: Vec<StringId> = arr.iter().take(10).collect();
        assert_eq!(head, ids[..10]);
    }
}
