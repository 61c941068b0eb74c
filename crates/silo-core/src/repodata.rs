//! Repodata: one attribute block attached to a repo.
//!
//! A block owns a local key table (referencing the pool dictionary) and a
//! page-indexed value stream: per solvable, one contiguous region holding
//! that solvable's encoded `(key, value)` entries. Lookups binary-search
//! the page index by solvable id, then walk the single region, skipping
//! values stored under other keys. Writes re-encode only the touched
//! solvable's region and repoint its page index entry; superseded regions
//! stay as dead bytes until the repo is written out.

use std::collections::HashMap;

use silo_schema::{
    DecodeError, KeyId, SolvableId, StringTable, TypeTag, Value, decode_value, encode_value,
    skip_value,
    wire::{Cursor, put_uint},
};

/// One entry of a block's local key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepodataKey {
    /// Pool-wide key id.
    pub key: KeyId,
    /// Declared value type (mirrors the dictionary entry).
    pub tag: TypeTag,
    /// Total encoded bytes stored under this key in this block; 0 while
    /// nothing is stored.
    pub size: u32,
}

/// Page index entry: where one solvable's region lives in the stream.
#[derive(Debug, Clone, Copy)]
struct Page {
    solvable: SolvableId,
    offset: u32,
    len: u32,
}

/// An attribute block: local key table, page index, encoded value stream.
#[derive(Debug, Default)]
pub struct Repodata {
    keys: Vec<RepodataKey>,
    by_key: HashMap<KeyId, usize>,
    data: Vec<u8>,
    // Sorted by solvable id; binary-searched on every lookup.
    pages: Vec<Page>,
}

impl Repodata {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys present in the block. O(1).
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Iterate the local key table in storage order.
    ///
    /// Each call yields a fresh, restartable sequence.
    pub fn keys(&self) -> impl Iterator<Item = RepodataKey> + '_ {
        self.keys.iter().copied()
    }

    /// Whether the block stores any values under the given key.
    pub fn has_key(&self, key: KeyId) -> bool {
        self.by_key.contains_key(&key)
    }

    /// Total encoded bytes stored under a key, if the key is present.
    pub fn key_size(&self, key: KeyId) -> Option<u32> {
        self.by_key.get(&key).map(|&i| self.keys[i].size)
    }

    /// Number of solvables with at least one entry in this block.
    pub fn solvable_count(&self) -> usize {
        self.pages.len()
    }

    /// Look up the value stored for `solvable` under `key`.
    ///
    /// Absence -- no page for the solvable, or no entry under the key --
    /// is `Ok(None)`, never an error.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the stored bytes disagree with the
    /// key's declared type; the rest of the block stays usable.
    pub fn lookup(
        &self,
        solvable: SolvableId,
        key: KeyId,
        strings: &dyn StringTable,
    ) -> Result<Option<Value>, DecodeError> {
        let Some(&local) = self.by_key.get(&key) else {
            return Ok(None);
        };
        let Some(region) = self.page_region(solvable) else {
            return Ok(None);
        };
        let mut cur = Cursor::new(region);
        let count = cur.uint32()?;
        for _ in 0..count {
            let idx = cur.uint32()?;
            let entry_key = self
                .keys
                .get(idx as usize)
                .ok_or(DecodeError::BadKeyRef(idx))?;
            if idx as usize == local {
                return decode_value(&mut cur, entry_key.tag, strings).map(Some);
            }
            skip_value(&mut cur, entry_key.tag)?;
        }
        Ok(None)
    }

    /// Append or overwrite one attribute for a solvable.
    ///
    /// The touched solvable's page is re-encoded and re-indexed; other
    /// pages are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TypeMismatch`] if `value` does not match
    /// `tag`, or a decode error if the solvable's existing page is
    /// unreadable.
    pub fn add(
        &mut self,
        solvable: SolvableId,
        key: KeyId,
        tag: TypeTag,
        value: Value,
        strings: &dyn StringTable,
    ) -> Result<(), DecodeError> {
        if value.tag() != tag {
            return Err(DecodeError::TypeMismatch {
                expected: tag,
                got: value.tag(),
            });
        }
        let mut entries = self.page_entries(solvable, strings)?;
        if let Some(slot) = entries.iter_mut().find(|(k, _, _)| *k == key) {
            slot.2 = value;
        } else {
            entries.push((key, tag, value));
        }
        self.set_page(solvable, &entries, strings)
    }

    /// Replace a solvable's whole page with the given entries.
    ///
    /// Entries are expected to be unique per key; if they are not, the
    /// first occurrence is the one lookups find.
    pub(crate) fn set_page(
        &mut self,
        solvable: SolvableId,
        entries: &[(KeyId, TypeTag, Value)],
        strings: &dyn StringTable,
    ) -> Result<(), DecodeError> {
        let mut locals = Vec::with_capacity(entries.len());
        for (key, tag, value) in entries {
            if value.tag() != *tag {
                return Err(DecodeError::TypeMismatch {
                    expected: *tag,
                    got: value.tag(),
                });
            }
            locals.push(self.register_key(*key, *tag));
        }

        // Whatever the old page stored no longer counts toward key sizes.
        if let Ok(pi) = self.page_position(solvable) {
            self.debit_page(pi)?;
        }

        let mut region = Vec::new();
        put_uint(&mut region, entries.len() as u64);
        for ((_, _, value), &local) in entries.iter().zip(&locals) {
            put_uint(&mut region, local as u64);
            let before = region.len();
            encode_value(&mut region, value, strings);
            self.keys[local].size += (region.len() - before) as u32;
        }

        let page = Page {
            solvable,
            offset: self.data.len() as u32,
            len: region.len() as u32,
        };
        self.data.extend_from_slice(&region);
        match self.page_position(solvable) {
            Ok(pi) => self.pages[pi] = page,
            Err(pi) => self.pages.insert(pi, page),
        }
        Ok(())
    }

    /// Ensure a key is present in the local table, returning its index.
    pub(crate) fn register_key(&mut self, key: KeyId, tag: TypeTag) -> usize {
        if let Some(&i) = self.by_key.get(&key) {
            return i;
        }
        let i = self.keys.len();
        self.keys.push(RepodataKey { key, tag, size: 0 });
        self.by_key.insert(key, i);
        i
    }

    /// Decode every page into `(solvable, entries)` form, in solvable
    /// order. Used when serializing the block.
    pub(crate) fn collect_pages(
        &self,
        strings: &dyn StringTable,
    ) -> Result<Vec<(SolvableId, Vec<(KeyId, TypeTag, Value)>)>, DecodeError> {
        let mut out = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let entries = self.page_entries(page.solvable, strings)?;
            out.push((page.solvable, entries));
        }
        Ok(out)
    }

    fn page_position(&self, solvable: SolvableId) -> Result<usize, usize> {
        self.pages.binary_search_by_key(&solvable, |p| p.solvable)
    }

    fn page_region(&self, solvable: SolvableId) -> Option<&[u8]> {
        let pi = self.page_position(solvable).ok()?;
        let page = self.pages[pi];
        self.data
            .get(page.offset as usize..(page.offset + page.len) as usize)
    }

    /// Decode a solvable's entries; empty if it has no page.
    fn page_entries(
        &self,
        solvable: SolvableId,
        strings: &dyn StringTable,
    ) -> Result<Vec<(KeyId, TypeTag, Value)>, DecodeError> {
        let Some(region) = self.page_region(solvable) else {
            return Ok(Vec::new());
        };
        let mut cur = Cursor::new(region);
        let count = cur.uint32()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let idx = cur.uint32()?;
            let entry_key = self
                .keys
                .get(idx as usize)
                .copied()
                .ok_or(DecodeError::BadKeyRef(idx))?;
            let value = decode_value(&mut cur, entry_key.tag, strings)?;
            entries.push((entry_key.key, entry_key.tag, value));
        }
        Ok(entries)
    }

    /// Subtract a page's per-key byte counts before it is superseded.
    fn debit_page(&mut self, pi: usize) -> Result<(), DecodeError> {
        let page = self.pages[pi];
        let region = self
            .data
            .get(page.offset as usize..(page.offset + page.len) as usize)
            .ok_or(DecodeError::Truncated {
                offset: page.offset as usize,
                needed: page.len as usize,
            })?;
        let mut cur = Cursor::new(region);
        let count = cur.uint32()?;
        let mut debits = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let idx = cur.uint32()?;
            let tag = self
                .keys
                .get(idx as usize)
                .ok_or(DecodeError::BadKeyRef(idx))?
                .tag;
            let before = cur.position();
            skip_value(&mut cur, tag)?;
            debits.push((idx as usize, (cur.position() - before) as u32));
        }
        for (idx, bytes) in debits {
            self.keys[idx].size = self.keys[idx].size.saturating_sub(bytes);
        }
        Ok(())
    }
}
