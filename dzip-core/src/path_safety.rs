use anyhow::{bail, Result};
use std::path::{Component, Path, PathBuf};

/// Resolve an archive entry name to a destination path under `root`:
/// no absolute paths, no drive prefixes, no parent traversal, and no
/// component that already exists as a symlink.
pub fn entry_destination(root: &Path, entry_name: &str) -> Result<PathBuf> {
    let rel = Path::new(entry_name);
    if rel.is_absolute() {
        bail!("absolute entry path not allowed: {:?}", entry_name);
    }
    let mut out = root.to_path_buf();
    let mut depth = 0usize;
    for comp in rel.components() {
        match comp {
            Component::Normal(c) => {
                out.push(c);
                depth += 1;
                if let Ok(meta) = std::fs::symlink_metadata(&out) {
                    if meta.file_type().is_symlink() {
                        bail!("entry path passes through a symlink: {:?}", out);
                    }
                }
            }
            Component::CurDir => {}
            _ => bail!("entry path escapes destination: {:?}", entry_name),
        }
    }
    if depth == 0 {
        bail!("empty entry path");
    }
    Ok(out)
}
