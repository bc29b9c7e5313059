use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::SplitError;

/// Move a consumed input pair into `processed_root`.
///
/// Both files must still exist; nothing is moved otherwise. A file of the
/// same name already in `processed_root` is replaced.
pub fn archive(audio: &Path, descriptor: &Path, processed_root: &Path) -> Result<(), SplitError> {
    for source in [audio, descriptor] {
        if !source.is_file() {
            return Err(SplitError::ArchiveSourceMissing(source.to_path_buf()));
        }
    }

    fs::create_dir_all(processed_root).map_err(|source| SplitError::Archive {
        path: processed_root.to_path_buf(),
        source,
    })?;

    for source in [audio, descriptor] {
        let destination = destination_for(source, processed_root)?;
        move_file(source, &destination).map_err(|err| SplitError::Archive {
            path: source.to_path_buf(),
            source: err,
        })?;
        debug!("archived '{}' to '{}'", source.display(), destination.display());
    }

    Ok(())
}

fn destination_for(source: &Path, processed_root: &Path) -> Result<PathBuf, SplitError> {
    let name = source.file_name().ok_or_else(|| SplitError::Archive {
        path: source.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    Ok(processed_root.join(name))
}

fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    if destination.exists() {
        fs::remove_file(destination)?;
    }

    // Renames fail across filesystems; fall back to copying.
    if fs::rename(source, destination).is_err() {
        fs::copy(source, destination)?;
        fs::remove_file(source)?;
    }
    Ok(())
}
