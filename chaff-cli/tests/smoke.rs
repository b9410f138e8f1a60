use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::process::Command;

fn write_random(path: &std::path::Path, bytes: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<u8> = (0..bytes).map(|_| rng.gen()).collect();
    std::fs::write(path, data).unwrap();
}

#[test]
fn scan_reconcile_delete_happy_path() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = td.child("data");
    data.create_dir_all().unwrap();
    data.child("a.txt").write_str("hello").unwrap();
    data.child("b/c.txt").write_str("world").unwrap();

    Command::cargo_bin("chaff")
        .unwrap()
        .current_dir(td.path())
        .args(["scan", "data", "manifest.parquet"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Found 2 files")
                .and(predicate::str::contains("Processed 2 files")),
        );
    td.child("manifest.parquet").assert(predicate::path::exists());

    // dry run first: counts reported, nothing removed
    Command::cargo_bin("chaff")
        .unwrap()
        .current_dir(td.path())
        .args(["reconcile", "data", "manifest.parquet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("found=2 not-found=0"));
    data.child("a.txt").assert(predicate::path::exists());
    data.child("b/c.txt").assert(predicate::path::exists());

    Command::cargo_bin("chaff")
        .unwrap()
        .current_dir(td.path())
        .args(["reconcile", "data", "manifest.parquet", "--delete"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("found=2 not-found=0")
                .and(predicate::str::contains("deleted 2 duplicate files")),
        );
    data.child("a.txt").assert(predicate::path::missing());
    data.child("b/c.txt").assert(predicate::path::missing());

    // a second destructive pass over the emptied tree is a no-op
    Command::cargo_bin("chaff")
        .unwrap()
        .current_dir(td.path())
        .args(["reconcile", "data", "manifest.parquet", "--delete"])
        .assert()
        .success()
        .stdout(predicate::str::contains("found=0 not-found=0"));
}

#[test]
fn changed_files_survive_a_destructive_reconcile() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = td.child("data");
    data.create_dir_all().unwrap();
    data.child("a.txt").write_str("hello").unwrap();
    data.child("b/c.txt").write_str("world").unwrap();

    Command::cargo_bin("chaff")
        .unwrap()
        .current_dir(td.path())
        .args(["scan", "data", "manifest.parquet"])
        .assert()
        .success();

    data.child("a.txt").write_str("hello!").unwrap();

    Command::cargo_bin("chaff")
        .unwrap()
        .current_dir(td.path())
        .args(["reconcile", "data", "manifest.parquet", "--delete"])
        .assert()
        .success()
        .stdout(predicate::str::contains("found=1 not-found=1"));
    data.child("a.txt").assert(predicate::path::exists());
    data.child("b/c.txt").assert(predicate::path::missing());
}

#[test]
fn a_different_key_matches_no_recorded_file() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = td.child("data");
    data.create_dir_all().unwrap();
    write_random(&data.child("blob.bin").path(), 256 * 1024, 7);

    Command::cargo_bin("chaff")
        .unwrap()
        .current_dir(td.path())
        .args(["scan", "data", "manifest.parquet"])
        .assert()
        .success();

    let other_key = "22".repeat(32);
    Command::cargo_bin("chaff")
        .unwrap()
        .current_dir(td.path())
        .args(["reconcile", "data", "manifest.parquet", "--key-hex", &other_key])
        .assert()
        .success()
        .stdout(predicate::str::contains("found=0 not-found=1"));
    data.child("blob.bin").assert(predicate::path::exists());
}

#[test]
fn missing_manifest_exits_nonzero() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = td.child("data");
    data.create_dir_all().unwrap();
    data.child("a.txt").write_str("hello").unwrap();

    Command::cargo_bin("chaff")
        .unwrap()
        .current_dir(td.path())
        .args(["reconcile", "data", "absent.parquet"])
        .assert()
        .failure();
}

#[test]
fn bad_key_exits_nonzero() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = td.child("data");
    data.create_dir_all().unwrap();

    Command::cargo_bin("chaff")
        .unwrap()
        .current_dir(td.path())
        .args(["scan", "data", "manifest.parquet", "--key-hex", "not-hex"])
        .assert()
        .failure();
}
