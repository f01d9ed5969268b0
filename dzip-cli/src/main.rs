use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use dzip_core::chain;
use dzip_core::consolidate;
use dzip_core::create::{create_delta_backup, CreateConfig};
use dzip_core::limit;
use dzip_core::verify;

#[derive(Parser)]
#[command(name = "dzip", version, about = "incremental zip backups")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a delta backup of a source file or directory
    Create {
        source: PathBuf,
        backup_folder: PathBuf,
        /// Include globs against relative paths (default: everything)
        #[arg(long)]
        include: Vec<String>,
        /// Exclude globs, e.g. -x "cache/*" -x "*.pyc"
        #[arg(short = 'x', long)]
        exclude: Vec<String>,
        /// Deflate level
        #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(i64).range(0..=9))]
        level: i64,
        #[arg(long, default_value_t = false)]
        progress: bool,
    },
    /// List the backup chain, oldest first
    List { backup_folder: PathBuf },
    /// Replay the whole chain into a full-state directory tree
    Consolidate {
        backup_folder: PathBuf,
        destination_folder: PathBuf,
    },
    /// Bound the chain length by merging the oldest deltas into one archive
    Limit {
        backup_folder: PathBuf,
        max_backups: usize,
        /// Allow the very oldest archive to be merged away too
        #[arg(long, default_value_t = false)]
        no_keep_oldest: bool,
        #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(i64).range(0..=9))]
        level: i64,
    },
    /// Re-hash every stored entry against the recorded manifests
    Verify { backup_folder: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Create { source, backup_folder, include, exclude, level, progress } => {
            let cfg = CreateConfig { include, exclude, level, show_progress: progress };
            create(&source, &backup_folder, &cfg)?;
        }
        Cmd::List { backup_folder } => list(&backup_folder)?,
        Cmd::Consolidate { backup_folder, destination_folder } => {
            consolidate(&backup_folder, &destination_folder)?;
        }
        Cmd::Limit { backup_folder, max_backups, no_keep_oldest, level } => {
            limit(&backup_folder, max_backups, !no_keep_oldest, level)?;
        }
        Cmd::Verify { backup_folder } => verify(&backup_folder)?,
    }
    Ok(())
}

fn create(source: &Path, backup_folder: &Path, cfg: &CreateConfig) -> Result<()> {
    let report = create_delta_backup(source, backup_folder, cfg)?;
    match &report.archive_path {
        Some(path) => {
            eprintln!(
                "Scanned {} file(s); {} new/changed ({} bytes), {} deletion(s)",
                report.files_scanned,
                report.files_added,
                report.bytes_added,
                report.files_deleted
            );
            println!("Backup created: {}", path.display());
        }
        None => {
            eprintln!("Scanned {} file(s); nothing changed", report.files_scanned);
            println!("No new backup needed");
        }
    }
    Ok(())
}

fn list(backup_folder: &Path) -> Result<()> {
    let backups = chain::previous_backups(backup_folder)?;
    if backups.is_empty() {
        println!("No backups under {}", backup_folder.display());
        return Ok(());
    }
    for b in &backups {
        let name = b.path.file_name().and_then(|s| s.to_str()).unwrap_or("?");
        let size = std::fs::metadata(&b.path).map(|m| m.len()).unwrap_or(0);
        println!(
            "{:40} files {:5}  deleted {:3}  {} bytes",
            name,
            b.manifest.files.len(),
            b.manifest.deleted.len(),
            size
        );
    }
    Ok(())
}

fn consolidate(backup_folder: &Path, destination_folder: &Path) -> Result<()> {
    let report = consolidate::consolidate_backups(backup_folder, destination_folder)?;
    eprintln!(
        "Applied {} archive(s): {} file(s) written, {} deletion(s)",
        report.archives_applied, report.files_written, report.files_deleted
    );
    println!("Consolidated into {}", destination_folder.display());
    Ok(())
}

fn limit(backup_folder: &Path, max_backups: usize, keep_oldest: bool, level: i64) -> Result<()> {
    let report = limit::limit_backups(backup_folder, max_backups, keep_oldest, level)?;
    match &report.archive_path {
        Some(path) => {
            eprintln!("Merged {} of {} archive(s)", report.merged, report.chain_len);
            println!("Consolidated backup: {}", path.display());
        }
        None => {
            println!(
                "Backup count ({}) within limit ({}); nothing to do",
                report.chain_len, max_backups
            );
        }
    }
    Ok(())
}

fn verify(backup_folder: &Path) -> Result<()> {
    let report = verify::verify_chain(backup_folder)?;
    eprintln!(
        "Archives {}; entries ok={}, bad={}; index {}",
        report.archives,
        report.entries_ok,
        report.entries_bad,
        if report.index_ok { "OK" } else { "MISMATCH" }
    );
    if report.entries_bad == 0 && report.index_ok {
        println!("OK");
    } else {
        println!("BAD");
        std::process::exit(1);
    }
    Ok(())
}
