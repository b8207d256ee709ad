//! Workflow archives
//!
//! `tar_dir` then `gzip_file` turns `<src>` into `<dest>/<src>.tar.gz`.
//! The intermediate `.tar` is left in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flate2::{Compression, GzBuilder};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::errors::ChapError;

fn base_name(path: &Path) -> Result<String, ChapError> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ChapError::PackagingError(format!("{} has no file name", path.display())))
}

/// Write `source` into `<target_dir>/<basename(source)>.tar`.
///
/// Entries are stored under a top-level directory named after `source`.
pub fn tar_dir(source: &Path, target_dir: &Path) -> Result<PathBuf, ChapError> {
    let base = base_name(source)?;
    if !source.is_dir() {
        return Err(ChapError::PackagingError(format!(
            "{} is not a directory",
            source.display()
        )));
    }

    let target = target_dir.join(format!("{}.tar", base));
    let file = fs::File::create(&target)?;
    let mut builder = tar::Builder::new(file);
    builder.follow_symlinks(false);

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        // the archive itself may live inside the tree being archived
        if path == target {
            continue;
        }
        let relative = path.strip_prefix(source).map_err(|e| {
            ChapError::PackagingError(format!("{}: {}", path.display(), e))
        })?;
        let name = Path::new(&base).join(relative);

        if entry.file_type().is_dir() {
            builder.append_dir(&name, path)?;
        } else {
            debug!("Adding {} as {}", path.display(), name.display());
            builder.append_path_with_name(path, &name)?;
        }
    }

    builder.into_inner()?.sync_all()?;
    info!("Created archive {}", target.display());
    Ok(target)
}

/// Compress `source` into `<target_dir>/<basename(source)>.gz`. The source is kept.
pub fn gzip_file(source: &Path, target_dir: &Path) -> Result<PathBuf, ChapError> {
    let base = base_name(source)?;
    let target = target_dir.join(format!("{}.gz", base));

    let mut reader = fs::File::open(source)?;
    let writer = fs::File::create(&target)?;
    let mut encoder = GzBuilder::new()
        .filename(base.as_bytes())
        .write(writer, Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.sync_all()?;

    info!("Compressed {} into {}", source.display(), target.display());
    Ok(target)
}
