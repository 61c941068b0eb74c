//! Repo: an ordered collection of solvables plus attached repodata blocks.

use silo_schema::{DecodeError, SolvableId, StringId, Value};

use crate::error::StoreError;
use crate::keys::KeyDict;
use crate::repodata::Repodata;
use crate::strings::StringPool;

/// One package entry within a repo.
///
/// Only the fixed core fields live here; everything else -- group, build
/// time, sizes, dependency lists -- is resolved through the attached
/// repodata blocks, which keeps the schema extensible without migrating
/// this struct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Solvable {
    /// Package name.
    pub name: StringId,
    /// Epoch:version-release string.
    pub evr: StringId,
    /// Target architecture.
    pub arch: StringId,
    /// Vendor string.
    pub vendor: StringId,
}

impl Solvable {
    /// Render the conventional `name-evr.arch` display form.
    pub fn display(&self, strings: &StringPool) -> String {
        let name = strings.get(self.name).unwrap_or_default();
        let evr = strings.get(self.evr).unwrap_or_default();
        let arch = strings.get(self.arch).unwrap_or_default();
        let mut out = String::from(name);
        if !evr.is_empty() {
            out.push('-');
            out.push_str(evr);
        }
        if !arch.is_empty() {
            out.push('.');
            out.push_str(arch);
        }
        out
    }
}

/// One package repository: solvables plus attached attribute blocks.
///
/// Solvable ids are dense, monotonically increasing, and never reused;
/// removal leaves a tombstone so outstanding ids stay valid for the
/// repo's lifetime. Repodata blocks keep their attachment order, which is
/// significant: when several blocks carry the same key for the same
/// solvable, the last-attached block wins.
#[derive(Debug)]
pub struct Repo {
    name: String,
    priority: i32,
    solvables: Vec<Option<Solvable>>,
    live: usize,
    data: Vec<Repodata>,
}

impl Repo {
    /// Create an empty repo with a display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            solvables: Vec::new(),
            live: 0,
            data: Vec::new(),
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Selection priority; higher wins when a package name exists in
    /// several repos.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Change the selection priority.
    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    /// Append a new, initially empty solvable and return its id.
    pub fn add_solvable(&mut self) -> SolvableId {
        let id = SolvableId(self.solvables.len() as u32);
        self.solvables.push(Some(Solvable::default()));
        self.live += 1;
        id
    }

    /// The solvable behind an id; `None` for removed or foreign ids.
    pub fn solvable(&self, id: SolvableId) -> Option<&Solvable> {
        self.solvables.get(id.as_usize())?.as_ref()
    }

    /// Mutable access to a live solvable.
    pub fn solvable_mut(&mut self, id: SolvableId) -> Option<&mut Solvable> {
        self.solvables.get_mut(id.as_usize())?.as_mut()
    }

    /// Tombstone a solvable. Returns whether it was live.
    ///
    /// The id is never reused; attribute entries for it remain in the
    /// attached blocks but stop being reachable through repo queries.
    pub fn remove_solvable(&mut self, id: SolvableId) -> bool {
        match self.solvables.get_mut(id.as_usize()) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    /// Number of live solvables. O(1).
    pub fn size(&self) -> usize {
        self.live
    }

    /// Iterate live solvables in id order.
    pub fn each_solvable(&self) -> impl Iterator<Item = (SolvableId, &Solvable)> {
        self.solvables
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (SolvableId(i as u32), s)))
    }

    /// Number of attached repodata blocks. O(1).
    pub fn data_count(&self) -> usize {
        self.data.len()
    }

    /// Bounds-checked block accessor.
    ///
    /// Negative and overflowing indices yield `None` rather than an
    /// error; callers probe with both as a matter of course.
    pub fn data(&self, index: i64) -> Option<&Repodata> {
        let index = usize::try_from(index).ok()?;
        self.data.get(index)
    }

    /// Mutable access to an attached block.
    pub fn data_mut(&mut self, index: usize) -> Option<&mut Repodata> {
        self.data.get_mut(index)
    }

    /// Attach a fresh, empty repodata block; returns its index.
    pub fn add_repodata(&mut self) -> usize {
        self.attach_data(Repodata::new())
    }

    /// Attach an already-populated block; returns its index.
    pub fn attach_data(&mut self, data: Repodata) -> usize {
        self.data.push(data);
        self.data.len() - 1
    }

    /// Iterate attached blocks in attachment order.
    pub fn each_data(&self) -> impl Iterator<Item = &Repodata> {
        self.data.iter()
    }

    /// Resolve an attribute for a solvable by key name.
    ///
    /// Blocks are consulted last-attached-first, so the most recently
    /// attached block that has the key wins. Within one block, keys are
    /// matched by name across all value types in storage order. Absence
    /// -- unknown name, dead solvable, or no entry anywhere -- is
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Propagates a [`DecodeError`] from the winning block.
    pub fn attribute(
        &self,
        dict: &KeyDict,
        strings: &StringPool,
        solvable: SolvableId,
        name: StringId,
    ) -> Result<Option<Value>, DecodeError> {
        if self.solvable(solvable).is_none() {
            return Ok(None);
        }
        for block in self.data.iter().rev() {
            for local in block.keys() {
                let matches = dict.get(local.key).is_some_and(|k| k.name() == name);
                if !matches {
                    continue;
                }
                if let Some(value) = block.lookup(solvable, local.key, strings)? {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    /// Find the first live solvable with the given name, in id order.
    pub fn find_solvable(&self, name: StringId) -> Option<SolvableId> {
        self.each_solvable()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
    }

    /// Add an attribute to an attached block, interning the key.
    ///
    /// The key's type is taken from the value.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoBlock`] or [`StoreError::NoSolvable`] for a bad
    /// address, or a decode error from the block write.
    pub fn set_attr(
        &mut self,
        dict: &mut KeyDict,
        strings: &mut StringPool,
        block: usize,
        solvable: SolvableId,
        name: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        if self.solvable(solvable).is_none() {
            return Err(StoreError::NoSolvable(solvable));
        }
        let tag = value.tag();
        let name_id = strings.intern(name);
        let key = dict.intern(name_id, tag);
        let repodata = self.data.get_mut(block).ok_or(StoreError::NoBlock(block))?;
        repodata.add(solvable, key, tag, value, strings)?;
        Ok(())
    }
}
