//! Pool: the top-level container of repos and shared dictionaries.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use silo_schema::{DecodeError, KeyId, SolvableId, StringId, TypeTag, Value};

use crate::error::{FormatError, StoreError};
use crate::keys::{Key, KeyDict};
use crate::repo::Repo;
use crate::solv;
use crate::strings::StringPool;

/// Identifier of a repo within one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId(pub u32);

impl RepoId {
    /// Raw id value.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Architecture compatibility table: for each base architecture, the
/// architectures it can run, best first. Unlisted architectures fall back
/// to themselves plus `noarch`.
const ARCH_POLICIES: &[(&str, &[&str])] = &[
    ("x86_64", &["x86_64", "i686", "i586", "i486", "i386", "noarch"]),
    ("i686", &["i686", "i586", "i486", "i386", "noarch"]),
    ("i586", &["i586", "i486", "i386", "noarch"]),
    ("aarch64", &["aarch64", "noarch"]),
    ("armv7l", &["armv7l", "armv6l", "noarch"]),
    ("ppc64le", &["ppc64le", "noarch"]),
    ("s390x", &["s390x", "noarch"]),
    ("riscv64", &["riscv64", "noarch"]),
];

/// Per-pool architecture policy, installed by [`Pool::set_arch`].
#[derive(Debug, Default)]
struct ArchPolicy {
    // Compatible arch ids, best first.
    order: Vec<StringId>,
}

impl ArchPolicy {
    fn score(&self, arch: StringId) -> Option<usize> {
        self.order.iter().position(|&a| a == arch)
    }
}

/// Top-level container owning repos, the string table, the key
/// dictionary and the selection policy.
///
/// Every pool is independent; nothing here is process-global, so several
/// pools can coexist in one process.
#[derive(Debug, Default)]
pub struct Pool {
    strings: StringPool,
    dict: KeyDict,
    repos: Vec<Repo>,
    arch: ArchPolicy,
}

impl Pool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            strings: StringPool::new(),
            dict: KeyDict::new(),
            repos: Vec::new(),
            arch: ArchPolicy::default(),
        }
    }

    // ------------------------------------------------------------------
    // Strings and keys
    // ------------------------------------------------------------------

    /// Intern a string into the pool-wide table.
    pub fn intern_str(&mut self, s: &str) -> StringId {
        self.strings.intern(s)
    }

    /// The string behind an id.
    pub fn str(&self, id: StringId) -> Option<&str> {
        self.strings.get(id)
    }

    /// Id of an already-interned string.
    pub fn find_str(&self, s: &str) -> Option<StringId> {
        self.strings.find(s)
    }

    /// Shared string table.
    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    /// Intern an attribute key.
    pub fn intern_key(&mut self, name: &str, tag: TypeTag) -> KeyId {
        let name_id = self.strings.intern(name);
        self.dict.intern(name_id, tag)
    }

    /// The key behind an id.
    pub fn key(&self, id: KeyId) -> Option<&Key> {
        self.dict.get(id)
    }

    /// Resolve a key id to its name and type.
    pub fn key_info(&self, id: KeyId) -> Option<(&str, TypeTag)> {
        let key = self.dict.get(id)?;
        let name = self.strings.get(key.name())?;
        Some((name, key.tag()))
    }

    /// Shared key dictionary.
    pub fn keys(&self) -> &KeyDict {
        &self.dict
    }

    // ------------------------------------------------------------------
    // Repos
    // ------------------------------------------------------------------

    /// Create an empty repo with a display name; returns its handle.
    pub fn add_repo(&mut self, name: &str) -> RepoId {
        let id = RepoId(self.repos.len() as u32);
        self.repos.push(Repo::new(name));
        id
    }

    /// The repo behind a handle.
    pub fn repo(&self, id: RepoId) -> Option<&Repo> {
        self.repos.get(id.as_u32() as usize)
    }

    /// Mutable access to a repo.
    pub fn repo_mut(&mut self, id: RepoId) -> Option<&mut Repo> {
        self.repos.get_mut(id.as_u32() as usize)
    }

    /// Number of repos in the pool.
    pub fn repo_count(&self) -> usize {
        self.repos.len()
    }

    /// Iterate repos in creation order.
    pub fn each_repo(&self) -> impl Iterator<Item = (RepoId, &Repo)> {
        self.repos
            .iter()
            .enumerate()
            .map(|(i, r)| (RepoId(i as u32), r))
    }

    // ------------------------------------------------------------------
    // Attribute access
    // ------------------------------------------------------------------

    /// Resolve an attribute for a solvable by key name.
    ///
    /// Absence at any level -- unknown repo, unknown name, missing value
    /// -- is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Propagates a [`DecodeError`] from the block that holds the value.
    pub fn attribute(
        &self,
        repo: RepoId,
        solvable: SolvableId,
        name: &str,
    ) -> Result<Option<Value>, DecodeError> {
        let Some(repo) = self.repo(repo) else {
            return Ok(None);
        };
        let Some(name_id) = self.strings.find(name) else {
            return Ok(None);
        };
        repo.attribute(&self.dict, &self.strings, solvable, name_id)
    }

    /// Add an attribute for a solvable, interning the key as needed.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoRepo`]/[`StoreError::NoBlock`]/
    /// [`StoreError::NoSolvable`] for a bad address, or a decode error
    /// from the block write.
    pub fn set_attr(
        &mut self,
        repo: RepoId,
        block: usize,
        solvable: SolvableId,
        name: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let repo = self
            .repos
            .get_mut(repo.as_u32() as usize)
            .ok_or(StoreError::NoRepo)?;
        repo.set_attr(&mut self.dict, &mut self.strings, block, solvable, name, value)
    }

    /// Render a solvable's `name-evr.arch` display form.
    pub fn solvable_str(&self, repo: RepoId, solvable: SolvableId) -> Option<String> {
        let s = self.repo(repo)?.solvable(solvable)?;
        Some(s.display(&self.strings))
    }

    // ------------------------------------------------------------------
    // Selection policy
    // ------------------------------------------------------------------

    /// Install the architecture-compatibility policy for this pool.
    ///
    /// Affects only the selection helpers ([`Pool::arch_score`],
    /// [`Pool::find_best`]); storage and lookup behavior is unchanged.
    pub fn set_arch(&mut self, arch: &str) {
        let compat: Vec<&str> = ARCH_POLICIES
            .iter()
            .find(|(base, _)| *base == arch)
            .map_or_else(|| vec![arch, "noarch"], |(_, list)| list.to_vec());
        self.arch.order = compat.iter().map(|a| self.strings.intern(a)).collect();
    }

    /// Compatibility rank of an architecture under the installed policy;
    /// 0 is the best match, `None` is incompatible.
    ///
    /// With no policy installed every architecture ranks 0.
    pub fn arch_score(&self, arch: StringId) -> Option<usize> {
        if self.arch.order.is_empty() {
            return Some(0);
        }
        self.arch.score(arch)
    }

    /// Pick the best live solvable with the given package name across
    /// all repos: highest repo priority first, then best arch rank, then
    /// lowest repo/solvable id.
    pub fn find_best(&self, name: &str) -> Option<(RepoId, SolvableId)> {
        let name_id = self.strings.find(name)?;
        let mut best: Option<(i32, usize, RepoId, SolvableId)> = None;
        for (rid, repo) in self.each_repo() {
            for (sid, s) in repo.each_solvable() {
                if s.name != name_id {
                    continue;
                }
                let Some(rank) = self.arch_score(s.arch) else {
                    continue;
                };
                let candidate = (repo.priority(), rank, rid, sid);
                let better = match &best {
                    None => true,
                    Some((p, r, ..)) => {
                        candidate.0 > *p || (candidate.0 == *p && candidate.1 < *r)
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        best.map(|(_, _, rid, sid)| (rid, sid))
    }

    // ------------------------------------------------------------------
    // Container I/O
    // ------------------------------------------------------------------

    /// Parse a binary container and attach its contents as a new repo.
    ///
    /// Parsing is strict and two-phase: the stream is fully validated
    /// before the pool is touched, so on failure the repo list is exactly
    /// as it was.
    ///
    /// # Errors
    ///
    /// Any [`FormatError`]; the pool's repo list is unchanged on failure.
    pub fn add_repo_from_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<RepoId, FormatError> {
        solv::read::load(self, name, bytes)
    }

    /// Load a container from any reader. See
    /// [`Pool::add_repo_from_bytes`].
    ///
    /// # Errors
    ///
    /// Any [`FormatError`], including I/O failures from the reader.
    pub fn add_repo_from_reader(
        &mut self,
        name: &str,
        mut reader: impl Read,
    ) -> Result<RepoId, FormatError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.add_repo_from_bytes(name, &bytes)
    }

    /// Load a container file via a read-only memory map.
    ///
    /// # Errors
    ///
    /// Any [`FormatError`], including I/O failures opening or mapping the
    /// file.
    #[allow(unsafe_code)]
    pub fn add_repo_from_path(&mut self, name: &str, path: &Path) -> Result<RepoId, FormatError> {
        let file = File::open(path)?;
        // SAFETY: the map is private and read-only; the file is a
        // repository snapshot not expected to change while mapped.
        let map = unsafe { memmap2::Mmap::map(&file)? };
        self.add_repo_from_bytes(name, &map)
    }

    /// Serialize one repo, with all attached blocks, to a container
    /// stream.
    ///
    /// # Errors
    ///
    /// Any [`FormatError`], including I/O failures from the writer.
    pub fn write_repo(&self, repo: &Repo, out: &mut impl Write) -> Result<(), FormatError> {
        solv::write::save(self, repo, out)
    }

    // Internal split-borrow access for the loader.
    pub(crate) fn parts_mut(&mut self) -> (&mut StringPool, &mut KeyDict, &mut Vec<Repo>) {
        (&mut self.strings, &mut self.dict, &mut self.repos)
    }
}
