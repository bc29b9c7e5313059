mod cli;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chaptersplit_core::{
    plan_run, Config, FailurePolicy, FfmpegExtractor, Orchestrator, PlannedAction,
    ProgressEvent, RunSummary,
};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use indicatif_log_bridge::LogWrapper;

use crate::cli::build_cli;

fn init_logging(multi: &MultiProgress) -> anyhow::Result<()> {
    let logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .build();
    let level = logger.filter();
    LogWrapper::new(multi.clone(), logger)
        .try_init()
        .context("failed to install logger")?;
    log::set_max_level(level);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
    init_logging(&multi)?;

    let matches = build_cli().get_matches();

    let input_dir = matches
        .get_one::<PathBuf>("dir")
        .expect("defaulted argument");
    let program = matches
        .get_one::<String>("ffmpeg")
        .expect("defaulted argument");
    let timeout = matches.get_one::<Duration>("timeout").copied();
    let policy = if matches.get_flag("fail-fast") {
        FailurePolicy::Abort
    } else {
        FailurePolicy::Continue
    };

    let mut builder = Config::builder(input_dir)
        .recursive(matches.get_flag("recursive"))
        .extractor_program(program.clone())
        .extraction_timeout(timeout)
        .failure_policy(policy);
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        builder = builder.output_dir(output);
    }
    if let Some(processed) = matches.get_one::<PathBuf>("processed") {
        builder = builder.processed_dir(processed);
    }
    let config = builder.build().with_context(|| {
        format!(
            "failed to create configuration for '{}'",
            input_dir.display()
        )
    })?;

    if matches.get_flag("dry-run") {
        return print_plan(&config);
    }

    let progress = multi.add(ProgressBar::new(0));
    let bar_style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(bar_style);

    let extractor = FfmpegExtractor::from_config(&config);
    let mut orchestrator = Orchestrator::new(config, extractor);

    let progress_handle = progress.clone();
    let result = orchestrator
        .run_with_progress(move |event| match event {
            ProgressEvent::Start { recordings } => {
                progress_handle.set_length(recordings as u64);
                progress_handle.enable_steady_tick(Duration::from_millis(100));
            }
            ProgressEvent::Recording { pair, tracks } => {
                progress_handle.set_message(format!("{} ({tracks} track(s))", pair.name));
            }
            ProgressEvent::Track { outcome } => {
                progress_handle.set_message(outcome.plan().title.clone());
            }
            ProgressEvent::RecordingFinished { .. } => progress_handle.inc(1),
            ProgressEvent::Finish => {
                progress_handle.set_message(String::from("Completed"));
            }
        })
        .with_context(|| {
            format!(
                "failed to process recordings in '{}'",
                input_dir.display()
            )
        });

    progress.finish_and_clear();

    print_summary(&result?);
    Ok(())
}

fn print_plan(config: &Config) -> anyhow::Result<()> {
    let planned = plan_run(config)
        .with_context(|| format!("failed to plan '{}'", config.input_dir.display()))?;

    if planned.is_empty() {
        println!("Dry run: no recordings found.");
        return Ok(());
    }

    println!("Dry run: found {} recording(s):", planned.len());
    for recording in planned {
        println!("{}:", recording.pair.name);
        match recording.tracks {
            Err(err) => println!("  skip recording: {err}"),
            Ok(tracks) => {
                for track in tracks {
                    let path = track.output.file_path.display();
                    match track.action {
                        PlannedAction::Extract => println!("  {path}"),
                        PlannedAction::SkipExisting => println!("  {path} (exists)"),
                        PlannedAction::Invalid(err) => println!("  skip track: {err}"),
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Extracted {} track(s), {} already present, {} invalid, {} failed.",
        summary.tracks_extracted(),
        summary.tracks_already_present(),
        summary.tracks_invalid(),
        summary.tracks_failed()
    );
    println!(
        "Processed {} recording(s), skipped {}, archived {}, {} archive failure(s).",
        summary.recordings_processed(),
        summary.recordings_skipped(),
        summary.recordings_archived(),
        summary.archive_failures()
    );
}
