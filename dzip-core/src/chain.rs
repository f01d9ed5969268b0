use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::archive;
use crate::manifest::ArchiveManifest;

/// Delta archives: `backup_2025-02-18_10-00-00.zip`.
pub const DELTA_PREFIX: &str = "backup_";
/// Merged archives produced by the limiter: `consolidated_<ts>.zip`.
pub const MERGED_PREFIX: &str = "consolidated_";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Timestamp embedded in an archive file name, or None for files that
/// are not chain members.
pub fn parse_archive_name(name: &str) -> Option<NaiveDateTime> {
    let stem = name.strip_suffix(".zip")?;
    let ts = stem
        .strip_prefix(DELTA_PREFIX)
        .or_else(|| stem.strip_prefix(MERGED_PREFIX))?;
    NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()
}

pub fn delta_file_name(ts: &NaiveDateTime) -> String {
    format!("{}{}.zip", DELTA_PREFIX, ts.format(TIMESTAMP_FORMAT))
}

pub fn merged_file_name(ts: &NaiveDateTime) -> String {
    format!("{}{}.zip", MERGED_PREFIX, ts.format(TIMESTAMP_FORMAT))
}

/// One member of a backup chain, with its hash index loaded.
#[derive(Clone, Debug)]
pub struct Backup {
    pub path: PathBuf,
    pub created: NaiveDateTime,
    pub manifest: ArchiveManifest,
    index: HashMap<String, String>,
}

impl Backup {
    pub fn new(path: PathBuf, created: NaiveDateTime, manifest: ArchiveManifest) -> Self {
        let index = manifest
            .files
            .iter()
            .map(|fe| (fe.rel_path.clone(), fe.hash_hex.clone()))
            .collect();
        Self { path, created, manifest, index }
    }

    /// Does this archive hold exactly this version of this path?
    pub fn contains(&self, rel_path: &str, hash_hex: &str) -> bool {
        self.index.get(rel_path).map(|h| h == hash_hex).unwrap_or(false)
    }
}

/// All chain members in `backup_folder`, oldest first by the timestamp
/// in the file name. Files that are not chain members are ignored; a
/// chain member whose manifest cannot be read fails the whole call.
pub fn previous_backups(backup_folder: &Path) -> Result<Vec<Backup>> {
    let mut named: Vec<(NaiveDateTime, PathBuf)> = Vec::new();
    let rd = std::fs::read_dir(backup_folder)
        .with_context(|| format!("read backup folder {}", backup_folder.display()))?;
    for ent in rd {
        let path = ent?.path();
        let name = match path.file_name().and_then(|s| s.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if let Some(ts) = parse_archive_name(name) {
            named.push((ts, path));
        }
    }
    named.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut backups = Vec::with_capacity(named.len());
    for (ts, path) in named {
        let manifest = archive::read_manifest(&path)?;
        backups.push(Backup::new(path, ts, manifest));
    }
    Ok(backups)
}

/// True if any prior archive already stores this exact `(path, hash)`
/// version. Short-circuits on the first hit, oldest first.
pub fn in_any_previous(rel_path: &str, hash_hex: &str, backups: &[Backup]) -> bool {
    backups.iter().any(|b| b.contains(rel_path, hash_hex))
}

/// Replay the chain's manifests into the set of paths a consolidation
/// would produce: files applied, then deletions, archive by archive.
pub fn live_set(backups: &[Backup]) -> BTreeMap<String, String> {
    let mut live = BTreeMap::new();
    for b in backups {
        for fe in &b.manifest.files {
            live.insert(fe.rel_path.clone(), fe.hash_hex.clone());
        }
        for d in &b.manifest.deleted {
            live.remove(d);
        }
    }
    live
}
