use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub rel_path: String,
    pub size: u64,
    pub hash_hex: String,
}

/// Per-archive manifest, stored as a JSON entry inside the zip.
/// `files` covers only this delta's contents; `deleted` records paths that
/// left the live set when the delta was taken.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ArchiveManifest {
    pub created_utc: String,
    pub source_name: String,
    pub files: Vec<FileEntry>,
    pub deleted: Vec<String>,
    pub index_hash_hex: String,
}

impl ArchiveManifest {
    pub fn new(
        created_utc: String,
        source_name: String,
        mut files: Vec<FileEntry>,
        mut deleted: Vec<String>,
    ) -> Self {
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        deleted.sort();
        let index_hash_hex = Self::index_hash(&files);
        Self { created_utc, source_name, files, deleted, index_hash_hex }
    }

    /// Digest over the whole hash index: blake3 of the sorted
    /// `path:hash` lines. Independent of the order `files` is stored in.
    pub fn index_hash(files: &[FileEntry]) -> String {
        let mut lines: Vec<String> =
            files.iter().map(|fe| format!("{}:{}\n", fe.rel_path, fe.hash_hex)).collect();
        lines.sort();
        let mut hasher = blake3::Hasher::new();
        for line in &lines {
            hasher.update(line.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn check_index_hash(&self) -> bool {
        Self::index_hash(&self.files) == self.index_hash_hex
    }

    /// Membership view: rel_path -> hash_hex.
    pub fn hash_index(&self) -> HashMap<&str, &str> {
        self.files.iter().map(|fe| (fe.rel_path.as_str(), fe.hash_hex.as_str())).collect()
    }
}
