// Directory-to-zip packing.
//
// Entries are stored relative to the source directory (no wrapping folder),
// in file-name order, with `/` separators on every platform.

use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::{Component, Path};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use sitegrab_common::ArchiveReport;

use crate::error::{PackError, Result};

/// Maximum deflate effort.
pub const COMPRESSION_LEVEL: i32 = 9;

fn file_options() -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Write the contents of `source` as a zip stream into `writer`.
///
/// Directories get explicit entries so empty ones survive extraction.
/// Symlinks are not followed and are left out. Returns the writer after the
/// central directory has been written.
pub fn pack_to_writer<W: Write + Seek>(
    source: &Path,
    writer: W,
    cancel: &CancellationToken,
) -> Result<(W, ArchiveReport)> {
    if !source.is_dir() {
        return Err(PackError::NotADirectory(source.to_path_buf()));
    }

    let mut zip = ZipWriter::new(writer);
    let mut report = ArchiveReport::default();
    let mut entries = 0usize;

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        if cancel.is_cancelled() {
            return Err(PackError::Cancelled);
        }
        let entry = entry.map_err(|e| PackError::Walk {
            path: source.to_path_buf(),
            source: e,
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| PackError::NotADirectory(source.to_path_buf()))?;
        let name = entry_name(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            zip.add_directory(format!("{name}/"), file_options())
                .map_err(|e| PackError::zip("add_directory", e))?;
            entries += 1;
        } else if file_type.is_file() {
            let len = entry.metadata().map(|m| m.len()).unwrap_or_default();
            let options = file_options().large_file(len > u64::from(u32::MAX));
            zip.start_file(name.as_str(), options)
                .map_err(|e| PackError::zip("start_file", e))?;
            let mut input =
                File::open(entry.path()).map_err(|e| PackError::io("open", entry.path(), e))?;
            let copied =
                io::copy(&mut input, &mut zip).map_err(|e| PackError::io("copy", entry.path(), e))?;
            debug!(entry = %name, bytes = copied, "Added file");
            report.files += 1;
            report.bytes += copied;
            entries += 1;
        } else {
            debug!(path = %entry.path().display(), "Skipping non-regular entry");
        }
    }

    if entries == 0 {
        return Err(PackError::EmptySource(source.to_path_buf()));
    }

    let writer = zip.finish().map_err(|e| PackError::zip("finish", e))?;
    Ok((writer, report))
}

/// Archive `source` into a new zip file at `dest`.
///
/// Returns only after the file has been flushed to disk. A failed or
/// cancelled run removes the partial archive.
pub fn pack_directory(source: &Path, dest: &Path, cancel: &CancellationToken) -> Result<ArchiveReport> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PackError::io("create_parent", parent, e))?;
    }
    let file = File::create(dest).map_err(|e| PackError::io("create", dest, e))?;

    let result = pack_to_writer(source, file, cancel).and_then(|(file, report)| {
        file.sync_all()
            .map_err(|e| PackError::io("sync", dest, e))?;
        Ok(report)
    });

    match result {
        Ok(report) => {
            info!(
                source = %source.display(),
                dest = %dest.display(),
                files = report.files,
                bytes = report.bytes,
                "Archive written"
            );
            Ok(report)
        }
        Err(err) => {
            let _ = std::fs::remove_file(dest);
            Err(err)
        }
    }
}
