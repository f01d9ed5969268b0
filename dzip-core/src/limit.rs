use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::chain;
use crate::consolidate;

#[derive(Debug, Clone)]
pub struct LimitReport {
    pub chain_len: usize,
    pub merged: usize,
    /// The merged archive, when any merging happened.
    pub archive_path: Option<PathBuf>,
}

/// Bound the chain length: when more than `max_backups` archives exist,
/// merge the oldest `len - max + 1` of them into one consolidated
/// archive named after the newest delta merged away, then delete the
/// merged-away archives. With `keep_oldest` the very first archive is
/// left untouched and the merge starts at the second.
pub fn limit_backups(
    backup_folder: &Path,
    max_backups: usize,
    keep_oldest: bool,
    level: i64,
) -> Result<LimitReport> {
    if max_backups == 0 {
        bail!("max_backups must be at least 1");
    }
    let backups = chain::previous_backups(backup_folder)?;
    let chain_len = backups.len();
    if chain_len <= max_backups {
        return Ok(LimitReport { chain_len, merged: 0, archive_path: None });
    }

    let to_merge = chain_len - max_backups + 1;
    let (start, end) = if keep_oldest && chain_len > 1 {
        (1, (1 + to_merge).min(chain_len))
    } else {
        (0, to_merge)
    };
    let slice = &backups[start..end];

    let newest_merged = &slice[slice.len() - 1];
    let destination = backup_folder.join(chain::merged_file_name(&newest_merged.created));
    let report = consolidate::merge_archives(slice, &destination, level)?;

    for b in slice {
        if b.path == report.archive_path {
            continue;
        }
        std::fs::remove_file(&b.path)
            .with_context(|| format!("remove merged-away archive {}", b.path.display()))?;
    }

    Ok(LimitReport {
        chain_len,
        merged: slice.len(),
        archive_path: Some(report.archive_path),
    })
}
