use std::path::{Path, PathBuf};

use log::warn;
use walkdir::WalkDir;

use crate::{Config, SplitError};

/// A descriptor and the audio file expected next to it.
///
/// The audio file is derived from the descriptor name and may not exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputPair {
    /// Shared base name, e.g. `show` for `show.info.json`.
    pub name: String,
    pub descriptor: PathBuf,
    pub audio: PathBuf,
}

impl InputPair {
    /// Pair `descriptor` with its audio file, or `None` if the name does not
    /// end in `descriptor_suffix`.
    pub fn from_descriptor(
        descriptor: &Path,
        descriptor_suffix: &str,
        audio_extension: &str,
    ) -> Option<Self> {
        let file_name = descriptor.file_name()?.to_str()?;
        let name = file_name.strip_suffix(descriptor_suffix)?;
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_owned(),
            descriptor: descriptor.to_path_buf(),
            audio: descriptor.with_file_name(format!("{name}.{audio_extension}")),
        })
    }
}

/// Find every descriptor under `config.input_dir`, sorted by path.
///
/// Only the top level is scanned unless `config.recursive` is set; the output
/// and processed directories are never entered.
pub fn discover(config: &Config) -> Result<Vec<InputPair>, SplitError> {
    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let mut pairs = Vec::new();

    let walker = WalkDir::new(&config.input_dir)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || (entry.path() != config.output_dir && entry.path() != config.processed_dir)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                let missing = SplitError::MissingInputDirectory(config.input_dir.clone());
                return Err(err.into_io_error().map_or(missing, SplitError::Io));
            }
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(pair) = InputPair::from_descriptor(
            entry.path(),
            &config.descriptor_suffix,
            &config.audio_extension,
        ) {
            pairs.push(pair);
        }
    }

    Ok(pairs)
}
