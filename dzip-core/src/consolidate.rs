use anyhow::{bail, Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::archive::{self, ArchiveWriter, MANIFEST_ENTRY};
use crate::chain::{self, Backup};
use crate::path_safety;

#[derive(Debug, Clone)]
pub struct ConsolidateReport {
    pub archives_applied: usize,
    pub files_written: u64,
    pub files_deleted: u64,
}

/// Replay the whole chain in `backup_folder` into `destination_folder`,
/// oldest to newest: each archive's files overwrite earlier versions,
/// then its deletion records are applied. The result is the exact source
/// tree as of the newest delta.
pub fn consolidate_backups(
    backup_folder: &Path,
    destination_folder: &Path,
) -> Result<ConsolidateReport> {
    let backups = chain::previous_backups(backup_folder)?;
    if backups.is_empty() {
        bail!("no backup archives under {}", backup_folder.display());
    }
    std::fs::create_dir_all(destination_folder)
        .with_context(|| format!("create destination {}", destination_folder.display()))?;

    let mut files_written = 0u64;
    let mut files_deleted = 0u64;
    for b in &backups {
        let mut za = archive::open(&b.path)?;
        for i in 0..za.len() {
            let mut entry = za.by_index(i)?;
            if !entry.is_file() {
                continue;
            }
            let name = entry.name().to_string();
            if name == MANIFEST_ENTRY {
                continue;
            }
            let dest = path_safety::entry_destination(destination_folder, &name)
                .with_context(|| format!("entry {:?} in {}", name, b.path.display()))?;
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out =
                File::create(&dest).with_context(|| format!("write {}", dest.display()))?;
            std::io::copy(&mut entry, &mut out)
                .with_context(|| format!("extract {:?} from {}", name, b.path.display()))?;
            files_written += 1;
        }
        for d in &b.manifest.deleted {
            let dest = path_safety::entry_destination(destination_folder, d)
                .with_context(|| format!("deletion record {:?} in {}", d, b.path.display()))?;
            if dest.is_file() {
                std::fs::remove_file(&dest)
                    .with_context(|| format!("remove {}", dest.display()))?;
                files_deleted += 1;
            }
        }
    }

    Ok(ConsolidateReport { archives_applied: backups.len(), files_written, files_deleted })
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub archive_path: PathBuf,
    pub files_kept: usize,
    pub deleted_recorded: usize,
}

/// Merge a sub-chain (oldest first) into a single archive at
/// `destination_zip` holding the newest surviving version of every file
/// plus the deletion records still in force, so the merged archive
/// replays exactly like the deltas it replaces.
pub fn merge_archives(
    backups: &[Backup],
    destination_zip: &Path,
    level: i64,
) -> Result<MergeReport> {
    if backups.is_empty() {
        bail!("nothing to merge");
    }

    // Newest first: the first archive to claim a path wins, and
    // deletions only suppress files from older archives.
    let mut keep: HashMap<&str, usize> = HashMap::new();
    let mut deleted: HashSet<&str> = HashSet::new();
    for (i, b) in backups.iter().enumerate().rev() {
        for fe in &b.manifest.files {
            let rel = fe.rel_path.as_str();
            if !deleted.contains(rel) && !keep.contains_key(rel) {
                keep.insert(rel, i);
            }
        }
        for d in &b.manifest.deleted {
            deleted.insert(d.as_str());
        }
    }
    // A deletion superseded by a later re-add is no longer in force.
    let deleted: Vec<String> = {
        let mut v: Vec<String> = deleted
            .into_iter()
            .filter(|d| !keep.contains_key(d))
            .map(|d| d.to_string())
            .collect();
        v.sort();
        v
    };

    let newest = &backups[backups.len() - 1];
    let mut writer = ArchiveWriter::create(destination_zip, level)?;
    for (i, b) in backups.iter().enumerate() {
        let mut za = archive::open(&b.path)?;
        for fe in &b.manifest.files {
            if keep.get(fe.rel_path.as_str()) != Some(&i) {
                continue;
            }
            let mut entry = za
                .by_name(&fe.rel_path)
                .with_context(|| format!("entry {:?} in {}", fe.rel_path, b.path.display()))?;
            writer.add_from_reader(&fe.rel_path, fe.size, &fe.hash_hex, &mut entry)?;
        }
    }

    let files_kept = writer.entry_count();
    let deleted_recorded = deleted.len();
    let (archive_path, _manifest) = writer.finish(
        &newest.manifest.source_name,
        deleted,
        newest.manifest.created_utc.clone(),
    )?;

    Ok(MergeReport { archive_path, files_kept, deleted_recorded })
}
