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
fn create_consolidate_verify_happy_path() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = td.child("demo_data");
    data.create_dir_all().unwrap();
    write_random(&data.child("a.bin").path(), 32 * 1024, 1);
    write_random(&data.child("b.bin").path(), 32 * 1024, 2);

    // First delta stores everything
    Command::cargo_bin("dzip").unwrap()
        .current_dir(td.path())
        .args(["create", "demo_data", "backups"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup created"));

    // Nothing changed: no second archive
    Command::cargo_bin("dzip").unwrap()
        .current_dir(td.path())
        .args(["create", "demo_data", "backups"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No new backup needed"));

    // Change one file, add another
    write_random(&data.child("a.bin").path(), 32 * 1024, 3);
    write_random(&data.child("c.bin").path(), 8 * 1024, 4);
    Command::cargo_bin("dzip").unwrap()
        .current_dir(td.path())
        .args(["create", "demo_data", "backups"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup created"));

    // Chain listing shows both archives
    Command::cargo_bin("dzip").unwrap()
        .current_dir(td.path())
        .args(["list", "backups"])
        .assert()
        .success()
        .stdout(predicate::str::contains("backup_").count(2));

    // Restore reproduces current content
    Command::cargo_bin("dzip").unwrap()
        .current_dir(td.path())
        .args(["consolidate", "backups", "restore"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Consolidated into"));
    for name in ["a.bin", "b.bin", "c.bin"] {
        let want = std::fs::read(data.child(name).path()).unwrap();
        let got = std::fs::read(td.path().join("restore").join(name)).unwrap();
        assert_eq!(want, got, "{} differs after restore", name);
    }

    // Chain verifies clean
    Command::cargo_bin("dzip").unwrap()
        .current_dir(td.path())
        .args(["verify", "backups"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn verify_reports_bad_on_corruption() {
    let td = assert_fs::TempDir::new().unwrap();
    let data = td.child("demo_data");
    data.create_dir_all().unwrap();
    write_random(&data.child("payload.bin").path(), 64 * 1024, 7);

    Command::cargo_bin("dzip").unwrap()
        .current_dir(td.path())
        .args(["create", "demo_data", "backups"])
        .assert()
        .success();

    // Damage the stored entry data
    let archive = std::fs::read_dir(td.path().join("backups"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.extension().map(|s| s == "zip").unwrap_or(false))
        .expect("archive written");
    {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = std::fs::OpenOptions::new().read(true).write(true).open(&archive).unwrap();
        f.seek(SeekFrom::Start(512)).unwrap();
        f.write_all(&[0xFFu8; 256]).unwrap();
    }

    Command::cargo_bin("dzip").unwrap()
        .current_dir(td.path())
        .args(["verify", "backups"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("BAD"));
}
