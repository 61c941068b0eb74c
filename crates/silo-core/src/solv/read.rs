//! Container reader: strict parse, then atomic commit.
//!
//! Parsing validates the entire stream -- every count, every index, every
//! embedded value -- into detached structures carrying file-local ids.
//! Only after that does commit intern strings and keys into the pool's
//! shared tables, translate ids, and attach the finished repo. A failure
//! anywhere leaves the pool's repo list untouched.

use tracing::debug;

use silo_schema::{
    CONTAINER_MAGIC, CONTAINER_VERSION, DecodeError, KeyId, SolvableId, StringId, TypeTag, Value,
    decode_value, wire::Cursor,
};

use crate::error::FormatError;
use crate::pool::{Pool, RepoId};
use crate::repo::Repo;
use crate::repodata::Repodata;

struct ParsedKey {
    name: u32,
    tag: TypeTag,
}

struct ParsedSolvable {
    name: u32,
    evr: u32,
    arch: u32,
    vendor: u32,
}

struct ParsedBlock {
    /// Local key table: (file key index, tag), in storage order.
    keys: Vec<(u32, TypeTag)>,
    /// Pages in ascending solvable order: (solvable, entries), each entry
    /// a (local key index, value) pair with file-local string ids.
    pages: Vec<(u32, Vec<(u32, Value)>)>,
}

struct Parsed {
    strings: Vec<String>,
    keys: Vec<ParsedKey>,
    solvables: Vec<ParsedSolvable>,
    blocks: Vec<ParsedBlock>,
}

/// Translate a value-level error into a format error, attributing
/// truncation to the section being parsed.
fn section<T>(result: Result<T, DecodeError>, what: &'static str) -> Result<T, FormatError> {
    result.map_err(|e| match e {
        DecodeError::Truncated { .. } => FormatError::Truncated { section: what },
        other => FormatError::Value(other),
    })
}

fn corrupt(msg: impl Into<String>) -> FormatError {
    FormatError::Corrupt(msg.into())
}

/// Whether every string reference inside `value` stays within the file
/// string table.
fn ids_in_range(value: &Value, limit: usize) -> bool {
    let mut ok = true;
    value.for_each_id(|id| ok &= (id.as_u32() as usize) < limit);
    ok
}

fn parse(bytes: &[u8]) -> Result<Parsed, FormatError> {
    let mut cur = Cursor::new(bytes);

    let magic = section(cur.take(4), "header")?;
    if magic != CONTAINER_MAGIC {
        return Err(FormatError::BadMagic);
    }
    let version = section(cur.byte(), "header")?;
    if version != CONTAINER_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    let string_count = section(cur.uint32(), "header")? as usize;
    let key_count = section(cur.uint32(), "header")? as usize;
    let solvable_count = section(cur.uint32(), "header")? as usize;
    let block_count = section(cur.uint32(), "header")? as usize;

    // Every record takes at least one byte; a count larger than the rest
    // of the stream cannot be honest, so reject it before allocating.
    for (count, what) in [
        (string_count, "string"),
        (key_count, "key"),
        (solvable_count, "solvable"),
        (block_count, "block"),
    ] {
        if count > cur.remaining() {
            return Err(corrupt(format!(
                "{what} count {count} exceeds remaining stream size {}",
                cur.remaining()
            )));
        }
    }
    if string_count == 0 {
        return Err(corrupt("string table must hold at least the empty string"));
    }

    let mut strings = Vec::with_capacity(string_count);
    for i in 0..string_count {
        let raw = section(cur.bytes(), "string table")?;
        let s = std::str::from_utf8(raw)
            .map_err(|_| corrupt(format!("string table entry {i} is not valid UTF-8")))?;
        if i == 0 && !s.is_empty() {
            return Err(corrupt("string table index 0 must be the empty string"));
        }
        strings.push(s.to_string());
    }

    let mut keys = Vec::with_capacity(key_count);
    for i in 0..key_count {
        let name = section(cur.uint32(), "key dictionary")?;
        if name as usize >= string_count {
            return Err(corrupt(format!("key {i} name index {name} out of range")));
        }
        let tag_raw = section(cur.uint32(), "key dictionary")?;
        let tag_raw = u8::try_from(tag_raw)
            .map_err(|_| corrupt(format!("key {i} type tag {tag_raw} out of range")))?;
        let tag = TypeTag::from_type_id(tag_raw)?;
        let _hint = section(cur.uint(), "key dictionary")?;
        keys.push(ParsedKey { name, tag });
    }

    let mut solvables = Vec::with_capacity(solvable_count);
    for i in 0..solvable_count {
        let mut field = |what: &str| -> Result<u32, FormatError> {
            let idx = section(cur.uint32(), "solvable section")?;
            if idx as usize >= string_count {
                return Err(corrupt(format!(
                    "solvable {i} {what} index {idx} out of range"
                )));
            }
            Ok(idx)
        };
        let name = field("name")?;
        let evr = field("evr")?;
        let arch = field("arch")?;
        let vendor = field("vendor")?;
        solvables.push(ParsedSolvable {
            name,
            evr,
            arch,
            vendor,
        });
    }

    let mut blocks = Vec::with_capacity(block_count);
    for bi in 0..block_count {
        let local_count = section(cur.uint32(), "block key table")? as usize;
        if local_count > key_count {
            return Err(corrupt(format!(
                "block {bi} declares {local_count} keys but the dictionary has {key_count}"
            )));
        }
        let mut local: Vec<(u32, TypeTag)> = Vec::with_capacity(local_count);
        for _ in 0..local_count {
            let gk = section(cur.uint32(), "block key table")?;
            let parsed = keys
                .get(gk as usize)
                .ok_or_else(|| corrupt(format!("block {bi} key index {gk} out of range")))?;
            if local.iter().any(|(g, _)| *g == gk) {
                return Err(corrupt(format!("block {bi} lists key {gk} twice")));
            }
            let _size = section(cur.uint(), "block key table")?;
            local.push((gk, parsed.tag));
        }

        let page_count = section(cur.uint32(), "page index")? as usize;
        if page_count > solvable_count {
            return Err(corrupt(format!(
                "block {bi} has {page_count} pages for {solvable_count} solvables"
            )));
        }
        let mut pages = Vec::with_capacity(page_count);
        let mut last: Option<u32> = None;
        for _ in 0..page_count {
            let sid = section(cur.uint32(), "page index")?;
            if sid as usize >= solvable_count {
                return Err(corrupt(format!(
                    "block {bi} page solvable {sid} out of range"
                )));
            }
            if last.is_some_and(|prev| prev >= sid) {
                return Err(corrupt(format!("block {bi} page index out of order")));
            }
            last = Some(sid);

            let region = section(cur.bytes(), "page data")?;
            let mut pc = Cursor::new(region);
            let entry_count = section(pc.uint32(), "page data")?;
            let mut entries = Vec::with_capacity(entry_count as usize);
            for _ in 0..entry_count {
                let li = section(pc.uint32(), "page data")?;
                let (_, tag) = *local
                    .get(li as usize)
                    .ok_or_else(|| corrupt(format!("block {bi} page entry key {li} out of range")))?;
                let value = section(decode_value(&mut pc, tag, &strings[..]), "page data")?;
                if !ids_in_range(&value, string_count) {
                    return Err(corrupt(format!(
                        "block {bi} value references a string outside the table"
                    )));
                }
                entries.push((li, value));
            }
            if !pc.is_empty() {
                return Err(corrupt(format!("block {bi} page has trailing bytes")));
            }
            pages.push((sid, entries));
        }
        blocks.push(ParsedBlock { keys: local, pages });
    }

    if !cur.is_empty() {
        return Err(corrupt("trailing bytes after the last block"));
    }

    Ok(Parsed {
        strings,
        keys,
        solvables,
        blocks,
    })
}

/// Parse `bytes` and attach the result to `pool` as a new repo.
pub(crate) fn load(pool: &mut Pool, name: &str, bytes: &[u8]) -> Result<RepoId, FormatError> {
    let parsed = parse(bytes)?;
    debug!(
        repo = name,
        strings = parsed.strings.len(),
        keys = parsed.keys.len(),
        solvables = parsed.solvables.len(),
        blocks = parsed.blocks.len(),
        "parsed container"
    );

    let (strings, dict, repos) = pool.parts_mut();

    // Translate file-local ids into the shared tables. Interning is
    // append-only, so this phase cannot disturb existing repos.
    let smap: Vec<StringId> = parsed.strings.iter().map(|s| strings.intern(s)).collect();
    let kmap: Vec<KeyId> = parsed
        .keys
        .iter()
        .map(|k| dict.intern(smap[k.name as usize], k.tag))
        .collect();

    let mut repo = Repo::new(name);
    for ps in &parsed.solvables {
        let sid = repo.add_solvable();
        if let Some(s) = repo.solvable_mut(sid) {
            s.name = smap[ps.name as usize];
            s.evr = smap[ps.evr as usize];
            s.arch = smap[ps.arch as usize];
            s.vendor = smap[ps.vendor as usize];
        }
    }

    for pb in &parsed.blocks {
        let mut block = Repodata::new();
        for &(gk, tag) in &pb.keys {
            block.register_key(kmap[gk as usize], tag);
        }
        for (sid, entries) in &pb.pages {
            let mapped: Vec<(KeyId, TypeTag, Value)> = entries
                .iter()
                .map(|(li, value)| {
                    let (gk, tag) = pb.keys[*li as usize];
                    let value = value
                        .clone()
                        .map_ids(&|id| smap[id.as_u32() as usize]);
                    (kmap[gk as usize], tag, value)
                })
                .collect();
            block.set_page(SolvableId(*sid), &mapped, strings)?;
        }
        repo.attach_data(block);
    }

    let id = RepoId(repos.len() as u32);
    repos.push(repo);
    debug!(repo = name, id = id.as_u32(), "attached repo");
    Ok(id)
}
