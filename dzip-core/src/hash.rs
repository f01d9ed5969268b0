use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Files at or above this size are hashed through a memory map.
const MMAP_THRESHOLD: u64 = 16 * 1024;

/// Content digest of a file as lowercase hex. Used for equality across
/// runs, not as a cryptographic commitment.
pub fn file_hash(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let len = f.metadata()?.len();
    if len >= MMAP_THRESHOLD {
        let mmap = unsafe { Mmap::map(&f)? };
        Ok(blake3::hash(&mmap).to_hex().to_string())
    } else {
        let mut hasher = blake3::Hasher::new();
        let mut reader = f;
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}
