use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub mod archive;
pub mod descriptor;
pub mod discover;
pub mod extractor;
pub mod orchestrator;
pub mod output;
pub mod plan;
pub mod sanitize;

pub use archive::archive;
pub use descriptor::{parse_descriptor, ChapterDescriptor, MetadataDescriptor};
pub use discover::{discover, InputPair};
pub use extractor::{ffmpeg_args, Extractor, FfmpegExtractor};
pub use orchestrator::{
    plan_run, ArchiveStatus, Orchestrator, PlannedAction, PlannedRecording, PlannedTrack,
    ProgressEvent, RecordingReport, RecordingStatus, RunSummary, TrackOutcome,
};
pub use output::{resolve, ResolvedOutput};
pub use plan::{build_plans, TrackPlan};
pub use sanitize::sanitize;

/// Suffix identifying a sidecar metadata descriptor.
pub const DEFAULT_DESCRIPTOR_SUFFIX: &str = ".info.json";
/// Extension of the audio file paired with each descriptor.
pub const DEFAULT_AUDIO_EXTENSION: &str = "opus";
/// Extension of the produced track files.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "opus";
/// Directory, relative to the working directory, that receives the tracks.
pub const DEFAULT_OUTPUT_DIR: &str = "output";
/// Directory, relative to the working directory, that receives consumed inputs.
pub const DEFAULT_PROCESSED_DIR: &str = "processed";
/// Program invoked to cut and tag tracks.
pub const DEFAULT_EXTRACTOR_PROGRAM: &str = "ffmpeg";

/// Errors that can occur while turning recordings into tracks.
#[derive(Debug, Error)]
pub enum SplitError {
    /// The working directory does not exist or is not a directory.
    #[error("input directory does not exist: {}", .0.display())]
    MissingInputDirectory(PathBuf),

    /// The sidecar descriptor could not be read.
    #[error("failed to read descriptor '{}'", .path.display())]
    ReadDescriptor {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sidecar descriptor is not a valid JSON object.
    #[error("invalid or malformed descriptor '{}'", .path.display())]
    ParseDescriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The descriptor has no audio file next to it.
    #[error("missing audio file '{}'", .0.display())]
    MissingAudio(PathBuf),

    /// A chapter does not describe a usable time range.
    #[error("chapter {track} '{title}' has an invalid range {start}s..{end}s")]
    InvalidChapterRange {
        track: u32,
        title: String,
        start: i64,
        end: i64,
    },

    /// The extractor program could not be started.
    #[error("failed to start extractor '{program}'")]
    ExtractorSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The extractor exited unsuccessfully.
    #[error("extractor failed for '{}' ({})", .output.display(), describe_status(.status))]
    Extraction { output: PathBuf, status: Option<i32> },

    /// The extractor ran longer than the configured timeout and was killed.
    #[error("extractor timed out after {timeout:?} for '{}'", .output.display())]
    ExtractionTimeout { output: PathBuf, timeout: Duration },

    /// An input file vanished before it could be archived.
    #[error("cannot archive missing file '{}'", .0.display())]
    ArchiveSourceMissing(PathBuf),

    /// Moving an input file into the processed area failed.
    #[error("failed to archive '{}'", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Wrapper around IO errors encountered while reading or writing files.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SplitError {
    /// Whether the error came from running the extractor.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            SplitError::ExtractorSpawn { .. }
                | SplitError::Extraction { .. }
                | SplitError::ExtractionTimeout { .. }
        )
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => String::from("terminated by signal"),
    }
}

/// What to do when the extractor fails for a track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure, leave the recording's inputs in place and move on.
    #[default]
    Continue,
    /// Stop the whole run and return the error.
    Abort,
}

/// Configuration for a conversion run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Canonicalized directory scanned for input pairs.
    pub input_dir: PathBuf,
    /// Root of the album tree that receives the tracks.
    pub output_dir: PathBuf,
    /// Directory that receives consumed input pairs.
    pub processed_dir: PathBuf,
    /// Whether subdirectories of `input_dir` are scanned as well.
    pub recursive: bool,
    /// File-name suffix that marks a sidecar descriptor.
    pub descriptor_suffix: String,
    /// Extension of the audio file expected next to each descriptor.
    pub audio_extension: String,
    /// Extension given to every produced track.
    pub output_extension: String,
    /// Program invoked by [`FfmpegExtractor`].
    pub extractor_program: String,
    /// Upper bound for a single extractor invocation.
    pub extraction_timeout: Option<Duration>,
    /// Whether a failed extraction stops the run.
    pub failure_policy: FailurePolicy,
}

impl Config {
    /// Construct a [`Config`] with every default, rooted at `input_dir`.
    pub fn new<P: AsRef<Path>>(input_dir: P) -> Result<Self, SplitError> {
        Self::builder(input_dir).build()
    }

    /// Start building a [`Config`] rooted at `input_dir`.
    pub fn builder<P: AsRef<Path>>(input_dir: P) -> ConfigBuilder {
        ConfigBuilder {
            input_dir: input_dir.as_ref().to_path_buf(),
            output_dir: None,
            processed_dir: None,
            recursive: false,
            extractor_program: DEFAULT_EXTRACTOR_PROGRAM.to_owned(),
            extraction_timeout: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Builder for [`Config`].
///
/// Output and processed directories default to `output/` and `processed/`
/// inside the input directory. Relative overrides are resolved against the
/// current directory.
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    input_dir: PathBuf,
    output_dir: Option<PathBuf>,
    processed_dir: Option<PathBuf>,
    recursive: bool,
    extractor_program: String,
    extraction_timeout: Option<Duration>,
    failure_policy: FailurePolicy,
}

impl ConfigBuilder {
    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn processed_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.processed_dir = Some(dir.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn extractor_program<S: Into<String>>(mut self, program: S) -> Self {
        self.extractor_program = program.into();
        self
    }

    pub fn extraction_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Validate the input directory and produce the [`Config`].
    pub fn build(self) -> Result<Config, SplitError> {
        if !self.input_dir.is_dir() {
            return Err(SplitError::MissingInputDirectory(self.input_dir));
        }
        let input_dir = fs::canonicalize(&self.input_dir)?;

        let output_dir = match self.output_dir {
            Some(dir) => absolute(dir)?,
            None => input_dir.join(DEFAULT_OUTPUT_DIR),
        };
        let processed_dir = match self.processed_dir {
            Some(dir) => absolute(dir)?,
            None => input_dir.join(DEFAULT_PROCESSED_DIR),
        };

        Ok(Config {
            input_dir,
            output_dir,
            processed_dir,
            recursive: self.recursive,
            descriptor_suffix: DEFAULT_DESCRIPTOR_SUFFIX.to_owned(),
            audio_extension: DEFAULT_AUDIO_EXTENSION.to_owned(),
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_owned(),
            extractor_program: self.extractor_program,
            extraction_timeout: self.extraction_timeout,
            failure_policy: self.failure_policy,
        })
    }
}

// Relative overrides are taken from the current directory, so they compare
// equal to the paths found while scanning.
fn absolute(path: PathBuf) -> Result<PathBuf, SplitError> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
