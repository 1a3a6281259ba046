//! Project file discovery and non-destructive zip backups.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::info;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::error::Result;

/// File extension of project files.
pub const PROJECT_EXTENSION: &str = "tstprj";

/// All project files under `root`, recursively, sorted by path.
pub fn find_project_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).into_iter().flatten() {
        let path = entry.path();
        if path.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(PROJECT_EXTENSION)
        {
            out.push(path.to_path_buf());
        }
    }
    out.sort();
    out
}

/// Zips `file` into a timestamped archive next to it and returns the
/// archive path. The original file is left untouched.
pub fn zip_backup_file(file: &Path) -> Result<PathBuf> {
    if !file.is_file() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a file").into());
    }
    let parent = file.parent().unwrap_or(Path::new("."));
    let name = file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("project");
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let dest = parent.join(format!("{}_{}.zip", name, ts));

    let out = fs::File::create(&dest)?;
    let mut zip = zip::ZipWriter::new(out);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    zip.start_file(name, options).map_err(io::Error::from)?;
    zip.write_all(&fs::read(file)?)?;
    zip.finish().map_err(io::Error::from)?;
    info!("backed up {} to {}", file.display(), dest.display());
    Ok(dest)
}
