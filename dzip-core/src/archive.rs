use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::manifest::{ArchiveManifest, FileEntry};

/// Name of the JSON manifest entry inside every archive.
pub const MANIFEST_ENTRY: &str = ".dzip/manifest.json";
/// Archive-level zip comment prefix; the rest is the index digest.
pub const COMMENT_PREFIX: &str = "dzip:v1:";

/// Entries this large or bigger are written in zip64 form.
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Streaming writer for one backup archive. Writes into `<final>.part`
/// and renames on `finish`; an unfinished writer removes the temp file
/// when dropped.
pub struct ArchiveWriter {
    zip: Option<ZipWriter<File>>,
    part_path: PathBuf,
    final_path: PathBuf,
    level: i64,
    files: Vec<FileEntry>,
}

impl ArchiveWriter {
    pub fn create(final_path: &Path, level: i64) -> Result<Self> {
        let part_path = final_path.with_extension("zip.part");
        let f = File::create(&part_path)
            .with_context(|| format!("create {}", part_path.display()))?;
        Ok(Self {
            zip: Some(ZipWriter::new(f)),
            part_path,
            final_path: final_path.to_path_buf(),
            level,
            files: Vec::new(),
        })
    }

    fn options(&self, size: u64) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.level))
            .large_file(size >= ZIP64_THRESHOLD)
    }

    fn writer(&mut self) -> &mut ZipWriter<File> {
        self.zip.as_mut().expect("archive writer already finished")
    }

    /// Stream a source file into the archive under `rel_path`.
    /// Returns the number of uncompressed bytes written.
    pub fn add_file(&mut self, rel_path: &str, src: &Path, hash_hex: &str) -> Result<u64> {
        let mut f = File::open(src).with_context(|| format!("open {}", src.display()))?;
        let size = f.metadata()?.len();
        let opts = self.options(size);
        self.writer()
            .start_file(rel_path, opts)
            .with_context(|| format!("start entry {:?}", rel_path))?;
        let written = std::io::copy(&mut f, self.writer())
            .with_context(|| format!("write entry {:?}", rel_path))?;
        self.files.push(FileEntry {
            rel_path: rel_path.to_string(),
            size: written,
            hash_hex: hash_hex.to_string(),
        });
        Ok(written)
    }

    /// Copy an entry out of another archive (used when merging a
    /// sub-chain); `size` and `hash_hex` come from the source manifest.
    pub fn add_from_reader(
        &mut self,
        rel_path: &str,
        size: u64,
        hash_hex: &str,
        reader: &mut impl Read,
    ) -> Result<u64> {
        let opts = self.options(size);
        self.writer()
            .start_file(rel_path, opts)
            .with_context(|| format!("start entry {:?}", rel_path))?;
        let written = std::io::copy(reader, self.writer())
            .with_context(|| format!("write entry {:?}", rel_path))?;
        self.files.push(FileEntry {
            rel_path: rel_path.to_string(),
            size: written,
            hash_hex: hash_hex.to_string(),
        });
        Ok(written)
    }

    pub fn entry_count(&self) -> usize {
        self.files.len()
    }

    /// Write the manifest entry, stamp the archive comment, close the
    /// zip, and rename `.part` into place. Returns the final path and
    /// the manifest that was stored.
    pub fn finish(
        mut self,
        source_name: &str,
        deleted: Vec<String>,
        created_utc: String,
    ) -> Result<(PathBuf, ArchiveManifest)> {
        let manifest = ArchiveManifest::new(
            created_utc,
            source_name.to_string(),
            std::mem::take(&mut self.files),
            deleted,
        );
        let json = serde_json::to_vec_pretty(&manifest)?;
        let opts = self.options(json.len() as u64);
        let zip = self.zip.as_mut().expect("archive writer already finished");
        zip.start_file(MANIFEST_ENTRY, opts).context("start manifest entry")?;
        zip.write_all(&json).context("write manifest entry")?;
        zip.set_comment(format!("{}{}", COMMENT_PREFIX, manifest.index_hash_hex));

        let zip = self.zip.take().expect("archive writer already finished");
        zip.finish().context("finalize zip")?;
        std::fs::rename(&self.part_path, &self.final_path).with_context(|| {
            format!("rename {} -> {}", self.part_path.display(), self.final_path.display())
        })?;
        Ok((self.final_path.clone(), manifest))
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if let Some(zip) = self.zip.take() {
            drop(zip);
            let _ = std::fs::remove_file(&self.part_path);
        }
    }
}

pub fn open(path: &Path) -> Result<ZipArchive<File>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    ZipArchive::new(f).with_context(|| format!("read zip {}", path.display()))
}

/// Load the manifest entry out of one archive.
pub fn read_manifest(path: &Path) -> Result<ArchiveManifest> {
    let mut za = open(path)?;
    let entry = za
        .by_name(MANIFEST_ENTRY)
        .map_err(|e| anyhow!("{}: no manifest entry ({})", path.display(), e))?;
    let manifest: ArchiveManifest = serde_json::from_reader(entry)
        .with_context(|| format!("decode manifest in {}", path.display()))?;
    Ok(manifest)
}

/// Index digest recorded in the archive comment, if the archive carries
/// a dzip tag.
pub fn comment_digest(za: &ZipArchive<File>) -> Option<String> {
    let comment = std::str::from_utf8(za.comment()).ok()?;
    comment.strip_prefix(COMMENT_PREFIX).map(|s| s.to_string())
}
