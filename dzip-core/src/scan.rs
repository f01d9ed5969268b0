use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file discovered under the source root.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub size: u64,
}

pub fn build_globsets(includes: &[String], excludes: &[String]) -> Result<(GlobSet, GlobSet)> {
    let mut incb = GlobSetBuilder::new();
    let mut excb = GlobSetBuilder::new();
    if includes.is_empty() {
        incb.add(Glob::new("**/*")?);
    }
    for g in includes {
        incb.add(Glob::new(g).with_context(|| format!("include pattern {:?}", g))?);
    }
    for g in excludes {
        excb.add(Glob::new(g).with_context(|| format!("exclude pattern {:?}", g))?);
    }
    Ok((incb.build()?, excb.build()?))
}

/// Walk `source` (a directory or a single file) and collect the files to
/// consider for a backup, relative paths slash-normalized and sorted.
/// Symlinks are not followed; anything under `skip` is left out so a
/// backup folder nested inside the source never backs itself up.
pub fn scan_source(
    source: &Path,
    includes: &[String],
    excludes: &[String],
    skip: Option<&Path>,
) -> Result<Vec<SourceFile>> {
    let md = std::fs::metadata(source).with_context(|| format!("stat {}", source.display()))?;
    let (inc, exc) = build_globsets(includes, excludes)?;

    let mut out = Vec::new();
    if md.is_file() {
        let rel = match source.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => anyhow::bail!("source has no file name: {}", source.display()),
        };
        if inc.is_match(&rel) && !exc.is_match(&rel) {
            out.push(SourceFile { abs_path: source.to_path_buf(), rel_path: rel, size: md.len() });
        }
        return Ok(out);
    }

    for ent in WalkDir::new(source).min_depth(1) {
        let ent = ent?;
        if !ent.file_type().is_file() {
            continue;
        }
        let path = ent.path();
        if let Some(skip) = skip {
            if path.starts_with(skip) {
                continue;
            }
        }
        let rel = pathdiff::diff_paths(path, source)
            .unwrap_or_else(|| path.file_name().unwrap().into());
        let rel = rel.to_string_lossy().replace('\\', "/");
        if !inc.is_match(&rel) {
            continue;
        }
        if exc.is_match(&rel) {
            continue;
        }
        out.push(SourceFile {
            abs_path: path.to_path_buf(),
            rel_path: rel,
            size: ent.metadata()?.len(),
        });
    }
    out.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(out)
}
