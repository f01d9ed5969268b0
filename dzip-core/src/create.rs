use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::archive::ArchiveWriter;
use crate::chain;
use crate::hash;
use crate::progress::Progress;
use crate::scan::{self, SourceFile};

pub struct CreateConfig {
    /// Include globs against slash-normalized relative paths; empty
    /// means everything.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Deflate level, 0..=9.
    pub level: i64,
    pub show_progress: bool,
}

impl Default for CreateConfig {
    fn default() -> Self {
        Self { include: Vec::new(), exclude: Vec::new(), level: 6, show_progress: false }
    }
}

#[derive(Debug, Clone)]
pub struct CreateReport {
    /// None when nothing changed and no archive was written.
    pub archive_path: Option<PathBuf>,
    pub files_scanned: usize,
    pub files_added: usize,
    pub bytes_added: u64,
    pub files_deleted: usize,
}

/// Write one delta backup of `source` into `backup_folder`: only files
/// whose `(rel_path, hash)` pair appears in no prior archive of the
/// chain are stored. Paths that left the live set are recorded as
/// deleted. When the delta would be empty, nothing is written at all.
pub fn create_delta_backup(
    source: &Path,
    backup_folder: &Path,
    cfg: &CreateConfig,
) -> Result<CreateReport> {
    let source = std::fs::canonicalize(source)
        .with_context(|| format!("resolve source {}", source.display()))?;
    std::fs::create_dir_all(backup_folder)
        .with_context(|| format!("create backup folder {}", backup_folder.display()))?;
    let backup_folder = std::fs::canonicalize(backup_folder)?;

    let backups = chain::previous_backups(&backup_folder)?;
    let files = scan::scan_source(&source, &cfg.include, &cfg.exclude, Some(backup_folder.as_path()))?;

    let progress = Progress::new(cfg.show_progress);
    progress.set_stage("hashing");
    progress.set_files_total(files.len() as u64);
    progress.start();

    let hashed: Vec<(SourceFile, String)> = files
        .par_iter()
        .map(|sf| -> Result<(SourceFile, String)> {
            let h = hash::file_hash(&sf.abs_path)?;
            progress.inc_file();
            Ok((sf.clone(), h))
        })
        .collect::<Result<_>>()?;

    let to_store: Vec<&(SourceFile, String)> = hashed
        .iter()
        .filter(|(sf, h)| !chain::in_any_previous(&sf.rel_path, h, &backups))
        .collect();

    let current: HashSet<&str> = hashed.iter().map(|(sf, _)| sf.rel_path.as_str()).collect();
    let deleted: Vec<String> = chain::live_set(&backups)
        .into_keys()
        .filter(|p| !current.contains(p.as_str()))
        .collect();

    if to_store.is_empty() && deleted.is_empty() {
        progress.stop();
        return Ok(CreateReport {
            archive_path: None,
            files_scanned: hashed.len(),
            files_added: 0,
            bytes_added: 0,
            files_deleted: 0,
        });
    }

    // Archive names have second resolution; never overwrite an existing
    // chain member.
    let mut ts = Utc::now().naive_utc();
    let archive_path = loop {
        let candidate = backup_folder.join(chain::delta_file_name(&ts));
        if !candidate.exists() {
            break candidate;
        }
        ts = ts + Duration::seconds(1);
    };

    progress.set_stage("writing");
    progress.set_files_total(to_store.len() as u64);
    progress.set_bytes_total(to_store.iter().map(|(sf, _)| sf.size).sum());

    let source_name = source
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "backup".to_string());

    let mut writer = ArchiveWriter::create(&archive_path, cfg.level)?;
    let mut bytes_added = 0u64;
    for (sf, h) in &to_store {
        let written = writer.add_file(&sf.rel_path, &sf.abs_path, h)?;
        bytes_added += written;
        progress.add_bytes(written);
    }

    let files_added = writer.entry_count();
    let files_deleted = deleted.len();
    let (archive_path, _manifest) =
        writer.finish(&source_name, deleted, Utc::now().to_rfc3339())?;
    progress.stop();

    Ok(CreateReport {
        archive_path: Some(archive_path),
        files_scanned: hashed.len(),
        files_added,
        bytes_added,
        files_deleted,
    })
}
