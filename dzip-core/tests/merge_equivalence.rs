use dzip_core::archive;
use dzip_core::chain;
use dzip_core::consolidate::{consolidate_backups, merge_archives};
use dzip_core::create::{create_delta_backup, CreateConfig};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

fn write(root: &Path, rel: &str, data: &[u8]) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, data).unwrap();
}

fn tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for ent in fs::read_dir(dir).unwrap() {
            let p = ent.unwrap().path();
            if p.is_dir() {
                walk(root, &p, out);
            } else {
                let rel = p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                out.insert(rel, fs::read(&p).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

#[test]
fn merged_subchain_replays_like_the_deltas_it_replaces() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("data");
    let bk = td.path().join("backups");

    // Four deltas with overwrites and a deletion in the middle.
    write(&root, "a.txt", b"a1");
    write(&root, "b.txt", b"b1");
    create_delta_backup(&root, &bk, &CreateConfig::default()).unwrap();

    write(&root, "a.txt", b"a2");
    write(&root, "c.txt", b"c1");
    create_delta_backup(&root, &bk, &CreateConfig::default()).unwrap();

    fs::remove_file(root.join("b.txt")).unwrap();
    write(&root, "c.txt", b"c2");
    create_delta_backup(&root, &bk, &CreateConfig::default()).unwrap();

    write(&root, "a.txt", b"a3");
    create_delta_backup(&root, &bk, &CreateConfig::default()).unwrap();

    let backups = chain::previous_backups(&bk).unwrap();
    assert_eq!(backups.len(), 4);

    // Merge the first three deltas into one archive, in a second folder
    // alongside a copy of the untouched tail.
    let bk2 = td.path().join("backups2");
    fs::create_dir_all(&bk2).unwrap();
    let merged_name = chain::merged_file_name(&backups[2].created);
    merge_archives(&backups[0..3], &bk2.join(&merged_name), 6).unwrap();
    let tail_name = backups[3].path.file_name().unwrap();
    fs::copy(&backups[3].path, bk2.join(tail_name)).unwrap();

    let out_a = td.path().join("restore_a");
    let out_b = td.path().join("restore_b");
    consolidate_backups(&bk, &out_a).unwrap();
    consolidate_backups(&bk2, &out_b).unwrap();
    assert_eq!(tree(&out_a), tree(&out_b));
    assert_eq!(tree(&out_a), tree(&root));
}

#[test]
fn merge_drops_deletions_superseded_by_readds() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("data");
    let bk = td.path().join("backups");

    write(&root, "x.txt", b"x1");
    create_delta_backup(&root, &bk, &CreateConfig::default()).unwrap();

    fs::remove_file(root.join("x.txt")).unwrap();
    write(&root, "y.txt", b"y1");
    create_delta_backup(&root, &bk, &CreateConfig::default()).unwrap();

    write(&root, "x.txt", b"x2");
    create_delta_backup(&root, &bk, &CreateConfig::default()).unwrap();

    let backups = chain::previous_backups(&bk).unwrap();
    let merged_path = td.path().join(chain::merged_file_name(&backups[2].created));
    let report = merge_archives(&backups, &merged_path, 6).unwrap();
    assert_eq!(report.files_kept, 2); // x.txt (v2) and y.txt

    let manifest = archive::read_manifest(&merged_path).unwrap();
    assert!(manifest.deleted.is_empty(), "stale deletion kept: {:?}", manifest.deleted);
    let mut rels: Vec<&str> = manifest.files.iter().map(|fe| fe.rel_path.as_str()).collect();
    rels.sort();
    assert_eq!(rels, vec!["x.txt", "y.txt"]);
}

#[test]
fn merge_keeps_deletions_still_in_force() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("data");
    let bk = td.path().join("backups");

    write(&root, "gone.txt", b"bye");
    write(&root, "stay.txt", b"hi");
    create_delta_backup(&root, &bk, &CreateConfig::default()).unwrap();

    fs::remove_file(root.join("gone.txt")).unwrap();
    create_delta_backup(&root, &bk, &CreateConfig::default()).unwrap();

    let backups = chain::previous_backups(&bk).unwrap();
    let merged_path = td.path().join(chain::merged_file_name(&backups[1].created));
    merge_archives(&backups, &merged_path, 6).unwrap();

    let manifest = archive::read_manifest(&merged_path).unwrap();
    assert_eq!(manifest.deleted, vec!["gone.txt".to_string()]);
    assert_eq!(manifest.files.len(), 1);
    assert_eq!(manifest.files[0].rel_path, "stay.txt");
}
