//! Driving recordings through planning, extraction and archival.

use std::path::PathBuf;

use log::{info, warn};

use crate::archive::archive;
use crate::descriptor::parse_descriptor;
use crate::discover::{discover, InputPair};
use crate::extractor::Extractor;
use crate::output::{resolve, ResolvedOutput};
use crate::plan::{build_plans, TrackPlan};
use crate::{Config, FailurePolicy, SplitError};

/// Progress notifications emitted while a run is executing.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    /// Discovery finished with this many recordings to process.
    Start { recordings: usize },
    /// A recording was parsed and planned into `tracks` tracks.
    Recording { pair: &'a InputPair, tracks: usize },
    /// A single track was handled.
    Track { outcome: &'a TrackOutcome },
    /// A recording is done, whether processed or skipped.
    RecordingFinished { report: &'a RecordingReport },
    /// Every recording has been handled.
    Finish,
}

/// What happened to one planned track.
#[derive(Debug)]
pub enum TrackOutcome {
    /// The extractor wrote the track.
    Extracted { plan: TrackPlan, output: PathBuf },
    /// The track file was already there when this track came up, left by an
    /// earlier run or by an earlier chapter with the same title; the extractor
    /// was not invoked.
    AlreadyPresent { plan: TrackPlan, output: PathBuf },
    /// The chapter bounds cannot be cut.
    Invalid { plan: TrackPlan, error: SplitError },
    /// Creating the album directory or running the extractor failed.
    Failed {
        plan: TrackPlan,
        output: PathBuf,
        error: SplitError,
    },
}

impl TrackOutcome {
    pub fn plan(&self) -> &TrackPlan {
        match self {
            TrackOutcome::Extracted { plan, .. }
            | TrackOutcome::AlreadyPresent { plan, .. }
            | TrackOutcome::Invalid { plan, .. }
            | TrackOutcome::Failed { plan, .. } => plan,
        }
    }

    /// Whether a rerun could still produce this track.
    pub fn is_failed(&self) -> bool {
        matches!(self, TrackOutcome::Failed { .. })
    }
}

/// What happened to a recording's input files after its tracks.
#[derive(Debug)]
pub enum ArchiveStatus {
    /// Both inputs were moved into the processed area.
    Archived,
    /// Some track failed to extract, so the inputs stay for a later run.
    Kept,
    /// No track failed but moving the inputs failed.
    Failed(SplitError),
}

#[derive(Debug)]
pub enum RecordingStatus {
    /// Nothing was attempted: the audio file is missing or the descriptor is unusable.
    Skipped(SplitError),
    Processed {
        tracks: Vec<TrackOutcome>,
        archive: ArchiveStatus,
    },
}

#[derive(Debug)]
pub struct RecordingReport {
    pub pair: InputPair,
    pub status: RecordingStatus,
}

impl RecordingReport {
    pub fn tracks(&self) -> &[TrackOutcome] {
        match &self.status {
            RecordingStatus::Processed { tracks, .. } => tracks.as_slice(),
            RecordingStatus::Skipped(_) => &[],
        }
    }
}

/// Reports for every recording handled by a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<RecordingReport>,
}

impl RunSummary {
    pub fn recordings_processed(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| matches!(report.status, RecordingStatus::Processed { .. }))
            .count()
    }

    pub fn recordings_skipped(&self) -> usize {
        self.reports.len() - self.recordings_processed()
    }

    pub fn tracks_extracted(&self) -> usize {
        self.count_tracks(|outcome| matches!(outcome, TrackOutcome::Extracted { .. }))
    }

    pub fn tracks_already_present(&self) -> usize {
        self.count_tracks(|outcome| matches!(outcome, TrackOutcome::AlreadyPresent { .. }))
    }

    pub fn tracks_invalid(&self) -> usize {
        self.count_tracks(|outcome| matches!(outcome, TrackOutcome::Invalid { .. }))
    }

    pub fn tracks_failed(&self) -> usize {
        self.count_tracks(|outcome| matches!(outcome, TrackOutcome::Failed { .. }))
    }

    pub fn recordings_archived(&self) -> usize {
        self.count_archives(|status| matches!(status, ArchiveStatus::Archived))
    }

    pub fn archive_failures(&self) -> usize {
        self.count_archives(|status| matches!(status, ArchiveStatus::Failed(_)))
    }

    fn count_tracks(&self, predicate: impl Fn(&TrackOutcome) -> bool) -> usize {
        self.reports
            .iter()
            .flat_map(RecordingReport::tracks)
            .filter(|outcome| predicate(outcome))
            .count()
    }

    fn count_archives(&self, predicate: impl Fn(&ArchiveStatus) -> bool) -> usize {
        self.reports
            .iter()
            .filter(|report| match &report.status {
                RecordingStatus::Processed { archive, .. } => predicate(archive),
                RecordingStatus::Skipped(_) => false,
            })
            .count()
    }
}

/// Processes recordings one at a time, tracks strictly in plan order.
pub struct Orchestrator<E> {
    config: Config,
    extractor: E,
}

impl<E: Extractor> Orchestrator<E> {
    pub fn new(config: Config, extractor: E) -> Self {
        Self { config, extractor }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_extractor(self) -> E {
        self.extractor
    }

    /// Process every recording found in the input directory.
    pub fn run(&mut self) -> Result<RunSummary, SplitError> {
        self.run_with_progress(|_| {})
    }

    /// Like [`run`](Self::run), reporting progress to `progress`.
    ///
    /// Returns an error only if the input directory cannot be scanned, or if
    /// an extraction fails under [`FailurePolicy::Abort`].
    pub fn run_with_progress<F>(&mut self, mut progress: F) -> Result<RunSummary, SplitError>
    where
        F: FnMut(ProgressEvent<'_>),
    {
        let pairs = discover(&self.config)?;
        info!(
            "found {} recording(s) in '{}'",
            pairs.len(),
            self.config.input_dir.display()
        );
        progress(ProgressEvent::Start {
            recordings: pairs.len(),
        });

        let mut summary = RunSummary::default();
        for pair in pairs {
            let report = self.process_pair_with(pair, &mut progress)?;
            progress(ProgressEvent::RecordingFinished { report: &report });
            summary.reports.push(report);
        }

        progress(ProgressEvent::Finish);
        info!(
            "done: {} track(s) extracted, {} already present, {} failed, {} recording(s) skipped",
            summary.tracks_extracted(),
            summary.tracks_already_present(),
            summary.tracks_failed() + summary.tracks_invalid(),
            summary.recordings_skipped()
        );
        Ok(summary)
    }

    /// Drive one recording to completion.
    pub fn process_pair(&mut self, pair: InputPair) -> Result<RecordingReport, SplitError> {
        self.process_pair_with(pair, &mut |_| {})
    }

    fn process_pair_with(
        &mut self,
        pair: InputPair,
        progress: &mut dyn FnMut(ProgressEvent<'_>),
    ) -> Result<RecordingReport, SplitError> {
        if !pair.audio.is_file() {
            warn!("missing audio file for '{}', skipping", pair.name);
            let error = SplitError::MissingAudio(pair.audio.clone());
            return Ok(skipped(pair, error));
        }

        let descriptor = match parse_descriptor(&pair.descriptor) {
            Ok(descriptor) => descriptor,
            Err(error) => {
                warn!("{}, skipping", describe(&error));
                return Ok(skipped(pair, error));
            }
        };

        let plans = build_plans(&descriptor);
        if descriptor.is_chaptered() {
            info!(
                "processing {} chapter(s) for '{}'",
                plans.len(),
                pair.audio.display()
            );
        } else {
            info!("processing '{}'", pair.audio.display());
        }
        progress(ProgressEvent::Recording {
            pair: &pair,
            tracks: plans.len(),
        });

        let mut tracks = Vec::with_capacity(plans.len());
        for plan in plans {
            let outcome = self.process_track(&pair, plan)?;
            progress(ProgressEvent::Track { outcome: &outcome });
            tracks.push(outcome);
        }

        let archive = self.archive_inputs(&pair, &tracks);
        Ok(RecordingReport {
            pair,
            status: RecordingStatus::Processed { tracks, archive },
        })
    }

    fn process_track(
        &mut self,
        pair: &InputPair,
        plan: TrackPlan,
    ) -> Result<TrackOutcome, SplitError> {
        if let Err(error) = plan.validate() {
            warn!("{error} in '{}', skipping track", pair.descriptor.display());
            return Ok(TrackOutcome::Invalid { plan, error });
        }

        let output = resolve(
            &plan,
            &self.config.output_dir,
            &self.config.output_extension,
        );
        if output.exists() {
            info!("skipping existing file: {}", output.file_path.display());
            return Ok(TrackOutcome::AlreadyPresent {
                plan,
                output: output.file_path,
            });
        }

        let result = output
            .create_directory()
            .map_err(SplitError::from)
            .and_then(|()| self.extractor.extract(&pair.audio, &output, &plan));

        match result {
            Ok(()) => {
                info!("saved: {}", output.file_path.display());
                Ok(TrackOutcome::Extracted {
                    plan,
                    output: output.file_path,
                })
            }
            Err(error)
                if error.is_extraction_failure()
                    && self.config.failure_policy == FailurePolicy::Abort =>
            {
                Err(error)
            }
            Err(error) => {
                warn!("{}; continuing with the next track", describe(&error));
                Ok(TrackOutcome::Failed {
                    plan,
                    output: output.file_path,
                    error,
                })
            }
        }
    }

    fn archive_inputs(&self, pair: &InputPair, tracks: &[TrackOutcome]) -> ArchiveStatus {
        // Invalid chapters never become cuttable, so only failures hold inputs back.
        if tracks.iter().any(TrackOutcome::is_failed) {
            warn!(
                "keeping inputs for '{}' until every failed track has been produced",
                pair.name
            );
            return ArchiveStatus::Kept;
        }

        match archive(&pair.audio, &pair.descriptor, &self.config.processed_dir) {
            Ok(()) => {
                info!(
                    "archived '{}' into '{}'",
                    pair.name,
                    self.config.processed_dir.display()
                );
                ArchiveStatus::Archived
            }
            Err(error) => {
                warn!("{}", describe(&error));
                ArchiveStatus::Failed(error)
            }
        }
    }
}

// The error and its sources, e.g. "failed to archive 'a.opus': permission denied".
fn describe(error: &SplitError) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn skipped(pair: InputPair, error: SplitError) -> RecordingReport {
    RecordingReport {
        pair,
        status: RecordingStatus::Skipped(error),
    }
}

/// What a run would do with one planned track.
#[derive(Debug)]
pub enum PlannedAction {
    Extract,
    SkipExisting,
    Invalid(SplitError),
}

#[derive(Debug)]
pub struct PlannedTrack {
    pub plan: TrackPlan,
    pub output: ResolvedOutput,
    pub action: PlannedAction,
}

/// The plan for one recording, or the reason it would be skipped.
#[derive(Debug)]
pub struct PlannedRecording {
    pub pair: InputPair,
    pub tracks: Result<Vec<PlannedTrack>, SplitError>,
}

/// Work out what [`Orchestrator::run`] would do, without touching the filesystem.
pub fn plan_run(config: &Config) -> Result<Vec<PlannedRecording>, SplitError> {
    let pairs = discover(config)?;

    Ok(pairs
        .into_iter()
        .map(|pair| {
            let tracks = plan_pair(config, &pair);
            PlannedRecording { pair, tracks }
        })
        .collect())
}

fn plan_pair(config: &Config, pair: &InputPair) -> Result<Vec<PlannedTrack>, SplitError> {
    if !pair.audio.is_file() {
        return Err(SplitError::MissingAudio(pair.audio.clone()));
    }
    let descriptor = parse_descriptor(&pair.descriptor)?;

    Ok(build_plans(&descriptor)
        .into_iter()
        .map(|plan| {
            let output = resolve(&plan, &config.output_dir, &config.output_extension);
            let action = match plan.validate() {
                Err(error) => PlannedAction::Invalid(error),
                Ok(()) if output.exists() => PlannedAction::SkipExisting,
                Ok(()) => PlannedAction::Extract,
            };
            PlannedTrack {
                plan,
                output,
                action,
            }
        })
        .collect())
}
