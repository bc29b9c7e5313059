use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::plan::TrackPlan;
use crate::sanitize::sanitize;

/// Where a planned track is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOutput {
    /// Album directory under the output root.
    pub directory: PathBuf,
    /// Track file inside [`directory`](Self::directory).
    pub file_path: PathBuf,
}

impl ResolvedOutput {
    /// Whether the track was already produced by an earlier run.
    pub fn exists(&self) -> bool {
        self.file_path.is_file()
    }

    /// Create the album directory and its parents if needed.
    pub fn create_directory(&self) -> io::Result<()> {
        fs::create_dir_all(&self.directory)
    }
}

/// Map `plan` to its location under `output_root`.
///
/// Album and title are sanitized separately, so a `/` in either never
/// introduces an extra directory level. A value that sanitizes to nothing,
/// `.` or `..` becomes underscores, so every track stays one directory below
/// `output_root`.
pub fn resolve(plan: &TrackPlan, output_root: &Path, extension: &str) -> ResolvedOutput {
    let directory = output_root.join(segment(&plan.album));
    let file_path = directory.join(format!("{}.{extension}", segment(&plan.title)));

    ResolvedOutput {
        directory,
        file_path,
    }
}

fn segment(text: &str) -> String {
    let name = sanitize(text);
    if name.is_empty() {
        String::from("_")
    } else if name.chars().all(|c| c == '.') {
        name.replace('.', "_")
    } else {
        name
    }
}
