//! Zip packing of a library data directory, for moving a shelf between
//! machines alongside (or instead of) a JSON backup.

use crate::error::ArchiveError;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;

/// Packs `src` recursively into a new zip at `dest`. Returns `dest`.
pub fn zip_dir(src: &Path, dest: &Path) -> Result<PathBuf, ArchiveError> {
    if !src.exists() {
        return Err(ArchiveError::SourceNotFound(src.to_path_buf()));
    }

    let file = File::create(dest)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        // The archive may live inside the tree it packs.
        if path == dest {
            continue;
        }
        let name = match path.strip_prefix(src) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        if entry.file_type().is_file() {
            zip.start_file(name.as_str(), options)?;
            let mut f = File::open(path)?;
            io::copy(&mut f, &mut zip)?;
        } else if !name.is_empty() {
            zip.add_directory(name.as_str(), options)?;
        }
    }

    zip.finish()?;
    debug!(src = %src.display(), dest = %dest.display(), "directory archived");
    Ok(dest.to_path_buf())
}

/// Extracts `zip_path` under `dest`, creating directories as needed.
/// Entries whose names would land outside `dest` are rejected.
pub fn unzip_to_dir(zip_path: &Path, dest: &Path) -> Result<PathBuf, ArchiveError> {
    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let rel = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
        let outpath = dest.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            io::copy(&mut entry, &mut outfile)?;
        }
    }
    debug!(zip = %zip_path.display(), dest = %dest.display(), "archive extracted");
    Ok(dest.to_path_buf())
}
