use chaptersplit_core::{
    ArchiveStatus, Config, Extractor, FailurePolicy, Orchestrator, RecordingStatus,
    ResolvedOutput, SplitError, TrackOutcome, TrackPlan,
};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// One request received by [`RecordingExtractor`].
#[derive(Clone, Debug)]
struct Invocation {
    input: PathBuf,
    output: PathBuf,
    plan: TrackPlan,
}

/// Test double that records every request instead of spawning a process.
///
/// Successful requests write a small placeholder so later runs see the track
/// as already produced. Requests whose title is listed in `fail_titles` fail
/// the way a non-zero exit would.
#[derive(Default)]
struct RecordingExtractor {
    invocations: Vec<Invocation>,
    fail_titles: Vec<String>,
}

impl RecordingExtractor {
    fn failing_on(title: &str) -> Self {
        Self {
            fail_titles: vec![title.to_owned()],
            ..Self::default()
        }
    }
}

impl Extractor for RecordingExtractor {
    fn extract(
        &mut self,
        input: &Path,
        output: &ResolvedOutput,
        plan: &TrackPlan,
    ) -> Result<(), SplitError> {
        self.invocations.push(Invocation {
            input: input.to_path_buf(),
            output: output.file_path.clone(),
            plan: plan.clone(),
        });

        if self.fail_titles.contains(&plan.title) {
            return Err(SplitError::Extraction {
                output: output.file_path.clone(),
                status: Some(1),
            });
        }
        fs::write(&output.file_path, b"track")?;
        Ok(())
    }
}

/// Write a descriptor and, unless `audio` is false, its audio companion.
fn write_recording(dir: &Path, name: &str, descriptor: &str, audio: bool) -> std::io::Result<()> {
    fs::write(dir.join(format!("{name}.info.json")), descriptor)?;
    if audio {
        fs::write(dir.join(format!("{name}.opus")), b"OggS fake opus payload")?;
    }
    Ok(())
}

const PODCAST: &str = r#"{
    "title": "Pod",
    "uploader": "X",
    "chapters": [
        {"start_time": 0, "end_time": 10, "title": "A"},
        {"start_time": 10, "end_time": 20, "title": "B"}
    ]
}"#;

#[test]
fn run_splits_chapters_into_numbered_tracks() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    write_recording(work_dir.path(), "episode", PODCAST, true)?;

    let config = Config::new(work_dir.path())?;
    let output_root = config.output_dir.clone();
    let input_dir = config.input_dir.clone();
    let mut orchestrator = Orchestrator::new(config, RecordingExtractor::default());
    let summary = orchestrator.run()?;

    assert_eq!(summary.tracks_extracted(), 2);
    assert_eq!(summary.recordings_archived(), 1);

    let invocations = orchestrator.into_extractor().invocations;
    assert_eq!(invocations.len(), 2);
    for (invocation, (title, start, end, number)) in
        invocations.iter().zip([("A", 0, 10, 1), ("B", 10, 20, 2)])
    {
        assert_eq!(invocation.input, input_dir.join("episode.opus"));
        assert_eq!(
            invocation.output,
            output_root.join("Pod").join(format!("{title}.opus"))
        );
        assert_eq!(
            invocation.plan,
            TrackPlan {
                start_seconds: Some(start),
                end_seconds: Some(end),
                album: "Pod".into(),
                artist: "X".into(),
                title: title.into(),
                track_number: number,
                is_chaptered: true,
            }
        );
    }

    work_dir.close()?;
    Ok(())
}

#[test]
fn run_turns_unchaptered_recording_into_single_track() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    write_recording(work_dir.path(), "solo", r#"{"title": "Solo"}"#, true)?;

    let config = Config::new(work_dir.path())?;
    let output_root = config.output_dir.clone();
    let mut orchestrator = Orchestrator::new(config, RecordingExtractor::default());
    orchestrator.run()?;

    let invocations = orchestrator.into_extractor().invocations;
    assert_eq!(invocations.len(), 1);
    let invocation = &invocations[0];
    assert_eq!(invocation.output, output_root.join("Solo").join("Solo.opus"));
    assert_eq!(invocation.plan.artist, "Unknown Artist");
    assert_eq!(invocation.plan.track_number, 1);
    assert!(!invocation.plan.is_chaptered);
    assert_eq!(invocation.plan.start_seconds, None);

    work_dir.close()?;
    Ok(())
}

#[test]
fn run_archives_inputs_once_after_success() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    write_recording(work_dir.path(), "episode", PODCAST, true)?;

    let config = Config::new(work_dir.path())?;
    let processed = config.processed_dir.clone();
    let mut orchestrator = Orchestrator::new(config, RecordingExtractor::default());
    let summary = orchestrator.run()?;

    assert!(!work_dir.path().join("episode.opus").exists());
    assert!(!work_dir.path().join("episode.info.json").exists());
    assert!(processed.join("episode.opus").is_file());
    assert!(processed.join("episode.info.json").is_file());
    assert_eq!(summary.archive_failures(), 0);

    work_dir.close()?;
    Ok(())
}

#[test]
fn run_never_invokes_extractor_for_existing_tracks() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    write_recording(work_dir.path(), "episode", PODCAST, true)?;

    let config = Config::new(work_dir.path())?;
    let album_dir = config.output_dir.join("Pod");
    fs::create_dir_all(&album_dir)?;
    fs::write(album_dir.join("A.opus"), b"from an earlier run")?;

    let processed = config.processed_dir.clone();
    let mut orchestrator = Orchestrator::new(config, RecordingExtractor::default());
    let summary = orchestrator.run()?;

    assert_eq!(summary.tracks_already_present(), 1);
    assert_eq!(summary.tracks_extracted(), 1);
    assert_eq!(fs::read(album_dir.join("A.opus"))?, b"from an earlier run");

    let invocations = orchestrator.into_extractor().invocations;
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].plan.title, "B");

    // A fully skipped or partly skipped recording is still archived once.
    assert!(processed.join("episode.opus").is_file());

    work_dir.close()?;
    Ok(())
}

#[test]
fn run_archives_fully_skipped_recording() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    write_recording(work_dir.path(), "episode", PODCAST, true)?;

    let config = Config::new(work_dir.path())?;
    let album_dir = config.output_dir.join("Pod");
    fs::create_dir_all(&album_dir)?;
    fs::write(album_dir.join("A.opus"), b"a")?;
    fs::write(album_dir.join("B.opus"), b"b")?;

    let processed = config.processed_dir.clone();
    let mut orchestrator = Orchestrator::new(config, RecordingExtractor::default());
    let summary = orchestrator.run()?;

    assert_eq!(summary.tracks_already_present(), 2);
    assert_eq!(summary.recordings_archived(), 1);
    assert!(processed.join("episode.info.json").is_file());
    assert!(orchestrator.into_extractor().invocations.is_empty());

    work_dir.close()?;
    Ok(())
}

#[test]
fn run_skips_malformed_descriptor_and_continues() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    write_recording(work_dir.path(), "a-broken", "{ this is not json", true)?;
    write_recording(work_dir.path(), "b-missing-audio", r#"{"title": "Gone"}"#, false)?;
    write_recording(work_dir.path(), "c-good", r#"{"title": "Solo"}"#, true)?;

    let config = Config::new(work_dir.path())?;
    let mut orchestrator = Orchestrator::new(config, RecordingExtractor::default());
    let summary = orchestrator.run()?;

    assert_eq!(summary.reports.len(), 3);
    assert_eq!(summary.recordings_skipped(), 2);
    assert!(matches!(
        summary.reports[0].status,
        RecordingStatus::Skipped(SplitError::ParseDescriptor { .. })
    ));
    assert!(matches!(
        summary.reports[1].status,
        RecordingStatus::Skipped(SplitError::MissingAudio(_))
    ));
    assert_eq!(summary.tracks_extracted(), 1);

    // Skipped inputs stay where they are.
    assert!(work_dir.path().join("a-broken.info.json").exists());
    assert!(work_dir.path().join("b-missing-audio.info.json").exists());

    work_dir.close()?;
    Ok(())
}

#[test]
fn run_keeps_inputs_when_a_track_fails() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    write_recording(work_dir.path(), "episode", PODCAST, true)?;
    write_recording(work_dir.path(), "later", r#"{"title": "Later"}"#, true)?;

    let config = Config::new(work_dir.path())?;
    let output_root = config.output_dir.clone();
    let mut orchestrator = Orchestrator::new(config, RecordingExtractor::failing_on("A"));
    let summary = orchestrator.run()?;

    assert_eq!(summary.tracks_failed(), 1);
    assert_eq!(summary.tracks_extracted(), 2);
    match &summary.reports[0].status {
        RecordingStatus::Processed { tracks, archive } => {
            assert!(matches!(tracks[0], TrackOutcome::Failed { .. }));
            assert!(matches!(tracks[1], TrackOutcome::Extracted { .. }));
            assert!(matches!(archive, ArchiveStatus::Kept));
        }
        other => panic!("unexpected status: {other:?}"),
    }
    assert!(work_dir.path().join("episode.opus").exists());
    assert!(output_root.join("Pod").join("B.opus").exists());
    assert!(output_root.join("Later").join("Later.opus").exists());

    work_dir.close()?;
    Ok(())
}

#[test]
fn run_aborts_on_extraction_failure_when_asked() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    write_recording(work_dir.path(), "episode", PODCAST, true)?;
    write_recording(work_dir.path(), "later", r#"{"title": "Later"}"#, true)?;

    let config = Config::builder(work_dir.path())
        .failure_policy(FailurePolicy::Abort)
        .build()?;
    let mut orchestrator = Orchestrator::new(config, RecordingExtractor::failing_on("A"));

    let err = orchestrator.run().expect_err("abort policy should stop the run");
    match err {
        SplitError::Extraction { output, status } => {
            assert!(output.ends_with("Pod/A.opus"));
            assert_eq!(status, Some(1));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(orchestrator.into_extractor().invocations.len(), 1);

    work_dir.close()?;
    Ok(())
}

#[test]
fn run_writes_into_custom_output_and_processed_directories() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let library = tempdir()?;
    write_recording(work_dir.path(), "solo", r#"{"title": "Solo: Live?"}"#, true)?;

    let config = Config::builder(work_dir.path())
        .output_dir(library.path().join("music"))
        .processed_dir(library.path().join("done"))
        .build()?;
    let mut orchestrator = Orchestrator::new(config, RecordingExtractor::default());
    orchestrator.run()?;

    let track = library
        .path()
        .join("music")
        .join("Solo_ Live_")
        .join("Solo_ Live_.opus");
    assert!(track.is_file());
    assert!(library.path().join("done").join("solo.info.json").is_file());

    let invocations = orchestrator.into_extractor().invocations;
    assert_eq!(invocations[0].plan.title, "Solo: Live?");

    library.close()?;
    work_dir.close()?;
    Ok(())
}

#[test]
fn run_keeps_tracks_and_inputs_when_archiving_fails() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    write_recording(work_dir.path(), "episode", PODCAST, true)?;
    let blocker = work_dir.path().join("not-a-directory");
    fs::write(&blocker, b"occupied")?;

    let config = Config::builder(work_dir.path())
        .processed_dir(&blocker)
        .build()?;
    let output_root = config.output_dir.clone();
    let mut orchestrator = Orchestrator::new(config, RecordingExtractor::default());
    let summary = orchestrator.run()?;

    assert_eq!(summary.tracks_extracted(), 2);
    assert_eq!(summary.archive_failures(), 1);
    match &summary.reports[0].status {
        RecordingStatus::Processed { archive, .. } => {
            assert!(matches!(
                archive,
                ArchiveStatus::Failed(SplitError::Archive { .. })
            ));
        }
        other => panic!("unexpected status: {other:?}"),
    }

    assert!(output_root.join("Pod").join("A.opus").is_file());
    assert!(output_root.join("Pod").join("B.opus").is_file());
    assert!(work_dir.path().join("episode.opus").is_file());
    assert!(work_dir.path().join("episode.info.json").is_file());
    assert_eq!(fs::read(&blocker)?, b"occupied");

    work_dir.close()?;
    Ok(())
}
