//! Container writer: collect and deduplicate, then emit in one pass.
//!
//! Writing re-encodes every value against a fresh file-local string
//! table, which is also what reclaims the dead regions a block
//! accumulates from page rewrites. Only live solvables are emitted;
//! their ids are densely renumbered and the page indices follow.

use std::collections::HashMap;
use std::io::Write;

use tracing::debug;

use silo_schema::{
    CONTAINER_MAGIC, CONTAINER_VERSION, KeyId, SolvableId, StringId, StringTable, TypeTag, Value,
    encode_value,
    wire::{put_bytes, put_uint},
};

use crate::error::FormatError;
use crate::pool::Pool;
use crate::repo::{Repo, Solvable};

/// File-local deduplicated string table under construction.
#[derive(Debug, Default)]
struct FileStrings {
    list: Vec<String>,
    index: HashMap<String, u32>,
}

impl FileStrings {
    fn new() -> Self {
        let mut fs = Self::default();
        fs.add("");
        fs
    }

    fn add(&mut self, s: &str) -> u32 {
        if let Some(&i) = self.index.get(s) {
            return i;
        }
        let i = self.list.len() as u32;
        self.list.push(s.to_string());
        self.index.insert(s.to_string(), i);
        i
    }
}

impl StringTable for FileStrings {
    fn resolve(&self, id: StringId) -> Option<&str> {
        self.list.get(id.as_u32() as usize).map(String::as_str)
    }

    fn find(&self, s: &str) -> Option<StringId> {
        self.index.get(s).copied().map(StringId)
    }
}

struct OutBlock {
    /// Local key table: (file key index, tag), storage order.
    keys: Vec<(u32, TypeTag)>,
    /// Pages in ascending renumbered-solvable order; values still carry
    /// pool string ids at this point.
    pages: Vec<(u32, Vec<(u32, Value)>)>,
}

/// Serialize `repo` with all attached blocks into `out`.
pub(crate) fn save(pool: &Pool, repo: &Repo, out: &mut impl Write) -> Result<(), FormatError> {
    let strings = pool.strings();
    let resolve = |id: StringId| -> Result<&str, FormatError> {
        strings
            .get(id)
            .ok_or_else(|| FormatError::Corrupt(format!("dangling string id {}", id.as_u32())))
    };

    // Live solvables, densely renumbered in id order.
    let mut remap: HashMap<SolvableId, u32> = HashMap::new();
    let mut live: Vec<&Solvable> = Vec::new();
    for (sid, s) in repo.each_solvable() {
        remap.insert(sid, live.len() as u32);
        live.push(s);
    }

    let mut fs = FileStrings::new();

    let mut solv_records: Vec<[u32; 4]> = Vec::with_capacity(live.len());
    for s in &live {
        solv_records.push([
            fs.add(resolve(s.name)?),
            fs.add(resolve(s.evr)?),
            fs.add(resolve(s.arch)?),
            fs.add(resolve(s.vendor)?),
        ]);
    }

    // File key dictionary in first-use order across the blocks.
    let mut fkeys: Vec<(u32, TypeTag)> = Vec::new();
    let mut fkey_index: HashMap<KeyId, u32> = HashMap::new();

    let mut out_blocks: Vec<OutBlock> = Vec::new();
    for block in repo.each_data() {
        let mut keys = Vec::new();
        let mut local_of: HashMap<KeyId, u32> = HashMap::new();
        for local in block.keys() {
            let key = pool.key(local.key).ok_or_else(|| {
                FormatError::Corrupt(format!("dangling key id {}", local.key.as_u32()))
            })?;
            let name_idx = fs.add(resolve(key.name())?);
            let fk = *fkey_index.entry(local.key).or_insert_with(|| {
                let i = fkeys.len() as u32;
                fkeys.push((name_idx, key.tag()));
                i
            });
            local_of.insert(local.key, keys.len() as u32);
            keys.push((fk, local.tag));
        }

        let mut pages = Vec::new();
        for (sid, entries) in block.collect_pages(strings)? {
            // Pages of tombstoned solvables are dropped here; this is
            // where their dead attribute bytes get reclaimed.
            let Some(&new_sid) = remap.get(&sid) else {
                continue;
            };
            let mut out_entries = Vec::with_capacity(entries.len());
            for (kid, _tag, value) in entries {
                let li = *local_of.get(&kid).ok_or_else(|| {
                    FormatError::Corrupt("page entry under unregistered key".to_string())
                })?;
                // Register every string the value references so the
                // table is complete before emission starts.
                match &value {
                    Value::Str(s) => {
                        fs.add(s);
                    }
                    _ => {
                        let mut ids = Vec::new();
                        value.for_each_id(|id| ids.push(id));
                        for id in ids {
                            fs.add(resolve(id)?);
                        }
                    }
                }
                out_entries.push((li, value));
            }
            pages.push((new_sid, out_entries));
        }
        out_blocks.push(OutBlock { keys, pages });
    }

    // Emission. The string table is frozen from here on.
    let file_id = |value: Value| -> Value {
        value.map_ids(&|id| {
            let idx = strings
                .get(id)
                .and_then(|s| fs.index.get(s))
                .copied()
                .unwrap_or(0);
            StringId(idx)
        })
    };

    let mut buf = Vec::new();
    buf.extend_from_slice(&CONTAINER_MAGIC);
    buf.push(CONTAINER_VERSION);
    put_uint(&mut buf, fs.list.len() as u64);
    put_uint(&mut buf, fkeys.len() as u64);
    put_uint(&mut buf, live.len() as u64);
    put_uint(&mut buf, out_blocks.len() as u64);

    for s in &fs.list {
        put_bytes(&mut buf, s.as_bytes());
    }
    for &(name_idx, tag) in &fkeys {
        put_uint(&mut buf, name_idx.into());
        put_uint(&mut buf, tag.type_id().into());
        // Size hint; the authoritative per-block sizes follow below.
        put_uint(&mut buf, 0);
    }
    for rec in &solv_records {
        for &idx in rec {
            put_uint(&mut buf, idx.into());
        }
    }

    for ob in &out_blocks {
        // Encode the pages first so the key table carries exact sizes.
        let mut sizes = vec![0u32; ob.keys.len()];
        let mut regions: Vec<(u32, Vec<u8>)> = Vec::with_capacity(ob.pages.len());
        for (sid, entries) in &ob.pages {
            let mut region = Vec::new();
            put_uint(&mut region, entries.len() as u64);
            for (li, value) in entries {
                put_uint(&mut region, (*li).into());
                let before = region.len();
                encode_value(&mut region, &file_id(value.clone()), &fs);
                sizes[*li as usize] += (region.len() - before) as u32;
            }
            regions.push((*sid, region));
        }

        put_uint(&mut buf, ob.keys.len() as u64);
        for (i, &(fk, _)) in ob.keys.iter().enumerate() {
            put_uint(&mut buf, fk.into());
            put_uint(&mut buf, sizes[i].into());
        }
        put_uint(&mut buf, regions.len() as u64);
        for (sid, region) in regions {
            put_uint(&mut buf, sid.into());
            put_uint(&mut buf, region.len() as u64);
            buf.extend_from_slice(&region);
        }
    }

    out.write_all(&buf)?;
    debug!(
        repo = repo.name(),
        bytes = buf.len(),
        solvables = live.len(),
        blocks = out_blocks.len(),
        "wrote container"
    );
    Ok(())
}
