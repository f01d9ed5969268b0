use dzip_core::path_safety::entry_destination;
use std::fs;

#[test]
fn normal_nested_paths_resolve_under_root() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path();
    let dest = entry_destination(root, "sub/dir/file.txt").unwrap();
    assert_eq!(dest, root.join("sub").join("dir").join("file.txt"));
    // `./` components are harmless.
    let dest = entry_destination(root, "./a.txt").unwrap();
    assert_eq!(dest, root.join("a.txt"));
}

#[test]
fn absolute_and_parent_paths_are_rejected() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path();

    let err = entry_destination(root, "/etc/passwd").expect_err("absolute");
    assert!(format!("{:#}", err).contains("absolute"));

    let err = entry_destination(root, "../outside.txt").expect_err("parent");
    assert!(format!("{:#}", err).contains("escapes"));

    let err = entry_destination(root, "a/../../b.txt").expect_err("nested parent");
    assert!(format!("{:#}", err).contains("escapes"));

    let err = entry_destination(root, "").expect_err("empty");
    assert!(format!("{:#}", err).contains("empty"));
}

#[cfg(target_family = "unix")]
#[test]
fn symlinked_ancestors_are_refused() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("root");
    let elsewhere = td.path().join("elsewhere");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&elsewhere).unwrap();
    std::os::unix::fs::symlink(&elsewhere, root.join("link")).unwrap();

    let err = entry_destination(&root, "link/file.txt").expect_err("expected symlink error");
    assert!(format!("{:#}", err).contains("symlink"));

    // A plain directory with the same shape is fine.
    fs::create_dir_all(root.join("real")).unwrap();
    entry_destination(&root, "real/file.txt").unwrap();
}
