//! Write-then-load round trips through the binary container format.

use silo_core::{
    Checksum, ChecksumKind, DirArray, DirEntry, FormatError, IdArray, Pool, RepoId, SolvableId,
    Value, attrs,
};

/// Build a pool with one repo, three solvables and a few attributes of
/// every value type, and return the serialized container.
fn build_container(pool: &mut Pool) -> (RepoId, Vec<u8>) {
    let name = pool.intern_str("emacs");
    let evr = pool.intern_str("29.4-1.2");
    let arch = pool.intern_str("x86_64");
    let vendor = pool.intern_str("openSUSE");
    let dep_a = pool.intern_str("libc.so.6");
    let dep_b = pool.intern_str("libgnutls.so.30");
    let dir = pool.intern_str("/usr/bin");
    let file = pool.intern_str("emacs");

    let rid = pool.add_repo("test-repo");
    let repo = pool.repo_mut(rid).unwrap();
    let s0 = repo.add_solvable();
    let s1 = repo.add_solvable();
    let s2 = repo.add_solvable();
    {
        let s = repo.solvable_mut(s0).unwrap();
        s.name = name;
        s.evr = evr;
        s.arch = arch;
        s.vendor = vendor;
    }
    repo.solvable_mut(s1).unwrap().name = name;
    repo.solvable_mut(s2).unwrap().arch = arch;
    let block = repo.add_repodata();

    pool.set_attr(rid, block, s0, attrs::GROUP, Value::Str("Productivity/Editors".into()))
        .unwrap();
    pool.set_attr(rid, block, s0, attrs::BUILDTIME, Value::U64(1_234_567_890))
        .unwrap();
    pool.set_attr(rid, block, s0, attrs::DOWNLOADSIZE, Value::U32(48_211_054))
        .unwrap();
    pool.set_attr(rid, block, s0, "solvable:installonly", Value::Bool(true))
        .unwrap();
    pool.set_attr(rid, block, s0, "solvable:sigdata", Value::Blob(vec![1, 2, 3, 4]))
        .unwrap();
    pool.set_attr(
        rid,
        block,
        s0,
        attrs::CHECKSUM,
        Value::Checksum(Checksum::new(ChecksumKind::Sha256, vec![0xab; 32]).unwrap()),
    )
    .unwrap();
    pool.set_attr(
        rid,
        block,
        s0,
        attrs::REQUIRES,
        Value::IdArray(IdArray::from_ids(&[dep_a, dep_b])),
    )
    .unwrap();
    pool.set_attr(
        rid,
        block,
        s0,
        attrs::FILELIST,
        Value::DirArray(DirArray::from_entries(&[DirEntry { dir, name: file }])),
    )
    .unwrap();
    pool.set_attr(rid, block, s1, "solvable:medianr", Value::Id(arch))
        .unwrap();

    let mut bytes = Vec::new();
    let repo = pool.repo(rid).unwrap();
    pool.write_repo(repo, &mut bytes).unwrap();
    (rid, bytes)
}

#[test]
fn every_value_type_survives_the_round_trip() {
    let mut source = Pool::new();
    let (_, bytes) = build_container(&mut source);

    let mut pool = Pool::new();
    let rid = pool.add_repo_from_bytes("loaded", &bytes).unwrap();
    let repo = pool.repo(rid).unwrap();
    assert_eq!(repo.size(), 3);
    assert_eq!(repo.data_count(), 1);

    let s0 = SolvableId(0);
    assert_eq!(
        pool.attribute(rid, s0, attrs::GROUP).unwrap(),
        Some(Value::Str("Productivity/Editors".into()))
    );
    assert_eq!(
        pool.attribute(rid, s0, attrs::BUILDTIME).unwrap(),
        Some(Value::U64(1_234_567_890))
    );
    assert_eq!(
        pool.attribute(rid, s0, attrs::DOWNLOADSIZE).unwrap(),
        Some(Value::U32(48_211_054))
    );
    assert_eq!(
        pool.attribute(rid, s0, "solvable:installonly").unwrap(),
        Some(Value::Bool(true))
    );
    assert_eq!(
        pool.attribute(rid, s0, "solvable:sigdata").unwrap(),
        Some(Value::Blob(vec![1, 2, 3, 4]))
    );

    let checksum = pool.attribute(rid, s0, attrs::CHECKSUM).unwrap().unwrap();
    let checksum = checksum.as_checksum().unwrap();
    assert_eq!(checksum.kind(), ChecksumKind::Sha256);
    assert_eq!(checksum.hex(), "ab".repeat(32));

    // Ids land in a different intern table; compare the resolved strings.
    let requires = pool.attribute(rid, s0, attrs::REQUIRES).unwrap().unwrap();
    let names: Vec<&str> = requires
        .as_id_array()
        .unwrap()
        .iter()
        .map(|id| pool.str(id).unwrap())
        .collect();
    assert_eq!(names, vec!["libc.so.6", "libgnutls.so.30"]);

    let filelist = pool.attribute(rid, s0, attrs::FILELIST).unwrap().unwrap();
    let entries: Vec<(&str, &str)> = filelist
        .as_dir_array()
        .unwrap()
        .iter()
        .map(|e| (pool.str(e.dir).unwrap(), pool.str(e.name).unwrap()))
        .collect();
    assert_eq!(entries, vec![("/usr/bin", "emacs")]);

    let media = pool.attribute(rid, SolvableId(1), "solvable:medianr").unwrap().unwrap();
    assert_eq!(pool.str(media.as_id().unwrap()), Some("x86_64"));

    // Core fields made it across too.
    assert_eq!(pool.solvable_str(rid, s0), Some("emacs-29.4-1.2.x86_64".into()));
    let s2 = pool.repo(rid).unwrap().solvable(SolvableId(2)).unwrap();
    assert_eq!(pool.str(s2.arch), Some("x86_64"));
}

#[test]
fn truncated_stream_leaves_the_pool_unchanged() {
    let mut source = Pool::new();
    let (_, bytes) = build_container(&mut source);

    let mut pool = Pool::new();
    pool.add_repo_from_bytes("first", &bytes).unwrap();
    let before = pool.repo_count();

    // Header intact, body cut short.
    for cut in [bytes.len() - 1, bytes.len() / 2, 16] {
        let err = pool.add_repo_from_bytes("partial", &bytes[..cut]).unwrap_err();
        assert!(
            matches!(err, FormatError::Truncated { .. } | FormatError::Corrupt(_)),
            "cut at {cut} gave {err}"
        );
        assert_eq!(pool.repo_count(), before);
    }
}

#[test]
fn bad_magic_is_rejected_outright() {
    let mut source = Pool::new();
    let (_, mut bytes) = build_container(&mut source);
    bytes[0] = b'X';

    let mut pool = Pool::new();
    let err = pool.add_repo_from_bytes("bad", &bytes).unwrap_err();
    assert!(matches!(err, FormatError::BadMagic));
    assert_eq!(pool.repo_count(), 0);
}

#[test]
fn unknown_version_is_rejected_outright() {
    let mut source = Pool::new();
    let (_, mut bytes) = build_container(&mut source);
    bytes[4] = 0x7e;

    let mut pool = Pool::new();
    let err = pool.add_repo_from_bytes("bad", &bytes).unwrap_err();
    assert!(matches!(err, FormatError::UnsupportedVersion(0x7e)));
}

#[test]
fn empty_and_garbage_streams_are_format_errors() {
    let mut pool = Pool::new();
    assert!(pool.add_repo_from_bytes("empty", &[]).is_err());
    assert!(pool.add_repo_from_bytes("garbage", &[0xde, 0xad, 0xbe, 0xef, 1, 2, 3]).is_err());
    assert_eq!(pool.repo_count(), 0);
}

#[test]
fn containers_load_from_disk_via_mmap() {
    let mut source = Pool::new();
    let (_, bytes) = build_container(&mut source);

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("test-repo.solv");
    std::fs::write(&path, &bytes).unwrap();

    let mut pool = Pool::new();
    let rid = pool.add_repo_from_path("from-disk", &path).unwrap();
    let repo = pool.repo(rid).unwrap();
    assert_eq!(repo.name(), "from-disk");
    assert_eq!(repo.size(), 3);
    assert_eq!(
        pool.attribute(rid, SolvableId(0), attrs::GROUP).unwrap(),
        Some(Value::Str("Productivity/Editors".into()))
    );
}

#[test]
fn tombstoned_solvables_are_not_written() {
    let mut source = Pool::new();
    let (rid, _) = build_container(&mut source);
    source.repo_mut(rid).unwrap().remove_solvable(SolvableId(1));

    let mut bytes = Vec::new();
    let repo = source.repo(rid).unwrap();
    source.write_repo(repo, &mut bytes).unwrap();

    let mut pool = Pool::new();
    let loaded = pool.add_repo_from_bytes("compacted", &bytes).unwrap();
    let repo = pool.repo(loaded).unwrap();
    assert_eq!(repo.size(), 2);

    // The survivors are renumbered densely; s0's attributes remain.
    assert_eq!(
        pool.attribute(loaded, SolvableId(0), attrs::BUILDTIME).unwrap(),
        Some(Value::U64(1_234_567_890))
    );
    // The old s2 is now id 1 and still has no group.
    assert_eq!(pool.attribute(loaded, SolvableId(1), attrs::GROUP).unwrap(), None);
}

#[test]
fn an_empty_repo_round_trips() {
    let mut source = Pool::new();
    let rid = source.add_repo("empty");
    let mut bytes = Vec::new();
    source
        .write_repo(source.repo(rid).unwrap(), &mut bytes)
        .unwrap();

    let mut pool = Pool::new();
    let loaded = pool
        .add_repo_from_reader("empty", bytes.as_slice())
        .unwrap();
    let repo = pool.repo(loaded).unwrap();
    assert_eq!(repo.size(), 0);
    assert_eq!(repo.data_count(), 0);
}

#[test]
fn loading_twice_shares_interned_keys() {
    let mut source = Pool::new();
    let (_, bytes) = build_container(&mut source);

    let mut pool = Pool::new();
    pool.add_repo_from_bytes("a", &bytes).unwrap();
    let keys_after_first = pool.keys().len();
    pool.add_repo_from_bytes("b", &bytes).unwrap();

    assert_eq!(pool.repo_count(), 2);
    assert_eq!(pool.keys().len(), keys_after_first);

    let names: Vec<&str> = pool.each_repo().map(|(_, r)| r.name()).collect();
    assert_eq!(names, vec!["a", "b"]);
}
