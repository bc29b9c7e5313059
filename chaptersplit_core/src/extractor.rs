//! Cutting and tagging tracks with an external tool.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::output::ResolvedOutput;
use crate::plan::TrackPlan;
use crate::{Config, SplitError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Something that can produce one track file from a recording.
///
/// The orchestrator only talks to this trait, so tests can record requests
/// instead of spawning processes.
pub trait Extractor {
    /// Write the track described by `plan`, read from `input`, to `output.file_path`.
    ///
    /// The album directory already exists when this is called.
    fn extract(
        &mut self,
        input: &Path,
        output: &ResolvedOutput,
        plan: &TrackPlan,
    ) -> Result<(), SplitError>;
}

impl<E: Extractor + ?Sized> Extractor for &mut E {
    fn extract(
        &mut self,
        input: &Path,
        output: &ResolvedOutput,
        plan: &TrackPlan,
    ) -> Result<(), SplitError> {
        (**self).extract(input, output, plan)
    }
}

/// Build the ffmpeg argument vector that cuts `plan` out of `input` into `output`.
///
/// The stream is copied without re-encoding. For chapters the seek is an
/// input option and the end boundary an output option.
pub fn ffmpeg_args(input: &Path, output: &Path, plan: &TrackPlan) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];

    let range = plan.range();
    if let Some((start, _)) = range {
        args.push("-ss".into());
        args.push(start.to_string().into());
    }

    args.push("-i".into());
    args.push(input.into());

    if let Some((_, end)) = range {
        args.push("-to".into());
        args.push(end.to_string().into());
    }

    for arg in ["-c", "copy", "-id3v2_version", "3"] {
        args.push(arg.into());
    }

    let tags = [
        ("title", plan.title.clone()),
        ("album", plan.album.clone()),
        ("artist", plan.artist.clone()),
        ("track", plan.track_number.to_string()),
    ];
    for (key, value) in tags {
        args.push("-metadata".into());
        args.push(format!("{key}={value}").into());
    }

    for arg in ["-loglevel", "quiet", "-nostats"] {
        args.push(arg.into());
    }

    args.push(output.into());
    args
}

/// Prefix of the hidden staging files written next to each track.
const STAGING_PREFIX: &str = ".chaptersplit-";

/// [`Extractor`] that runs ffmpeg (or a compatible program).
///
/// The program writes to a uniquely named hidden staging file in the album
/// directory, which is renamed onto the track path only after a successful
/// exit. An interrupted run thus never leaves a truncated track where the
/// existence check would find it, and no other track's path is ever used
/// for staging.
#[derive(Clone, Debug)]
pub struct FfmpegExtractor {
    program: String,
    timeout: Option<Duration>,
}

impl FfmpegExtractor {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.extractor_program.clone()).with_timeout(config.extraction_timeout)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn wait(&self, child: &mut Child, output: &Path) -> Result<ExitStatus, SplitError> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                if let Err(err) = child.kill() {
                    warn!("failed to kill extractor for '{}': {err}", output.display());
                }
                let _ = child.wait();
                return Err(SplitError::ExtractionTimeout {
                    output: output.to_path_buf(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Run the program writing to `staging`; errors name the final `output`.
    fn run(
        &self,
        input: &Path,
        staging: &Path,
        output: &Path,
        plan: &TrackPlan,
    ) -> Result<(), SplitError> {
        let args = ffmpeg_args(input, staging, plan);
        debug!("running {} {:?}", self.program, args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SplitError::ExtractorSpawn {
                program: self.program.clone(),
                source,
            })?;

        let status = self.wait(&mut child, output)?;
        if !status.success() {
            return Err(SplitError::Extraction {
                output: output.to_path_buf(),
                status: status.code(),
            });
        }
        Ok(())
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new(crate::DEFAULT_EXTRACTOR_PROGRAM)
    }
}

impl Extractor for FfmpegExtractor {
    fn extract(
        &mut self,
        input: &Path,
        output: &ResolvedOutput,
        plan: &TrackPlan,
    ) -> Result<(), SplitError> {
        let suffix = staging_suffix(&output.file_path);
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX).suffix(&suffix);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // Tracks end up readable like any other file in the library.
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }

        // Dropping the path on any early return removes the staging file.
        let staging = builder.tempfile_in(&output.directory)?.into_temp_path();

        self.run(input, &staging, &output.file_path, plan)?;
        staging
            .persist(&output.file_path)
            .map_err(|err| SplitError::Io(err.error))
    }
}

/// Staging files keep the track's extension, which the tool uses to pick
/// its muxer.
fn staging_suffix(file_path: &Path) -> String {
    file_path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
