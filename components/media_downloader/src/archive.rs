// components/media_downloader/src/archive.rs
use crate::DownloadError;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Write `files` into a flat zip archive at `archive_path`
///
/// Entries are named after the file name only, in the order given. The
/// entry timestamp is fixed so the archive depends on file contents alone.
pub(crate) fn write_zip(archive_path: &Path, files: &[PathBuf]) -> Result<(), DownloadError> {
    let packaging = |reason: String| DownloadError::Packaging {
        path: archive_path.to_path_buf(),
        reason,
    };

    let archive = File::create(archive_path).map_err(|e| packaging(e.to_string()))?;
    let mut writer = ZipWriter::new(BufWriter::new(archive));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| packaging(format!("{} has no file name", path.display())))?;

        writer
            .start_file(name, options)
            .map_err(|e| packaging(e.to_string()))?;

        let mut source = BufReader::new(
            File::open(path).map_err(|e| packaging(format!("{}: {}", path.display(), e)))?,
        );
        std::io::copy(&mut source, &mut writer).map_err(|e| packaging(e.to_string()))?;
    }

    writer.finish().map_err(|e| packaging(e.to_string()))?;
    Ok(())
}
