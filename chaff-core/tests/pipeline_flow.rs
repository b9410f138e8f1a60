use chaff_core::fingerprint::{fingerprint_file, HashKey};
use chaff_core::pipeline::{scan_records, FileRecord, PipelineConfig};
use chaff_core::progress::Progress;
use chaff_core::walk::build_globset;
use std::collections::HashSet;
use std::fs;

#[test]
fn every_file_is_emitted_exactly_once_in_arbitrary_order() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("data");
    fs::create_dir_all(root.join("nested/deeper")).unwrap();
    for i in 0..100 {
        let dir = match i % 3 {
            0 => root.clone(),
            1 => root.join("nested"),
            _ => root.join("nested/deeper"),
        };
        fs::write(dir.join(format!("f{:03}.bin", i)), format!("payload {}", i)).unwrap();
    }

    let (include, exclude) = build_globset(&[], &[]).unwrap();
    // small queue and a few workers to force real interleaving
    let cfg = PipelineConfig { workers: 3, queue_depth: 4 };
    let progress = Progress::new(false);
    let records: Vec<FileRecord> =
        scan_records(&root, HashKey::default(), include, exclude, cfg, &progress)
            .collect::<anyhow::Result<Vec<_>>>()
            .unwrap();

    assert_eq!(records.len(), 100);
    let rel_paths: HashSet<&str> = records.iter().map(|r| r.rel_path.as_str()).collect();
    assert_eq!(rel_paths.len(), 100);
    assert!(rel_paths.contains("f000.bin"));
    assert!(rel_paths.contains("nested/f001.bin"));
    assert!(rel_paths.contains("nested/deeper/f002.bin"));
    assert_eq!(progress.found(), 100);
    assert_eq!(progress.hashed(), 100);
}

#[test]
fn records_carry_the_keyed_digest() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("one.txt"), "payload").unwrap();

    let key = HashKey::default();
    let (include, exclude) = build_globset(&[], &[]).unwrap();
    let records: Vec<FileRecord> =
        scan_records(&root, key, include, exclude, PipelineConfig::default(), &Progress::new(false))
            .collect::<anyhow::Result<Vec<_>>>()
            .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].digest, fingerprint_file(&key, &root.join("one.txt")).unwrap());
    assert_eq!(records[0].abs_path, root.join("one.txt"));
}

#[test]
fn fingerprinting_an_unreadable_path_is_a_typed_error_not_a_digest() {
    let td = tempfile::tempdir().unwrap();
    let err = fingerprint_file(&HashKey::default(), td.path()).unwrap_err();
    assert_eq!(err.path, td.path());
}

#[cfg(target_family = "unix")]
#[test]
fn a_symlink_in_the_tree_aborts_the_scan() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("data");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("real.txt"), "data").unwrap();
    std::os::unix::fs::symlink(root.join("real.txt"), root.join("alias.txt")).unwrap();

    let (include, exclude) = build_globset(&[], &[]).unwrap();
    let result: anyhow::Result<Vec<FileRecord>> = scan_records(
        &root,
        HashKey::default(),
        include,
        exclude,
        PipelineConfig::default(),
        &Progress::new(false),
    )
    .collect();
    let err = result.unwrap_err();
    assert!(err.to_string().contains("symlink"), "unexpected error: {:#}", err);
}
