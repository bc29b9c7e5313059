use std::path::PathBuf;
use std::time::Duration;

use clap::{builder::ValueParser, value_parser, Arg, ArgAction, Command};

/// Parse a `--timeout` value: whole seconds, optionally suffixed with `s`,
/// `m` or `h` (`90`, `90s`, `5m`, `1h`).
pub fn parse_timeout(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let invalid = || format!("invalid timeout '{value}', expected e.g. 90s, 5m or 1h");
    let (digits, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => value.split_at(split),
        None => (value, "s"),
    };
    let factor = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        _ => return Err(invalid()),
    };

    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    match amount.checked_mul(factor) {
        Some(0) => Err("timeout must be greater than zero".into()),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Err("timeout is too large".into()),
    }
}

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Turn downloaded recordings into tagged album tracks, one per chapter")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("dir")
                .value_name("DIR")
                .help("Directory holding <name>.info.json and <name>.opus pairs")
                .default_value(".")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_DIR")
                .help("Root of the album tree [default: DIR/output]")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("processed")
                .short('p')
                .long("processed")
                .value_name("PROCESSED_DIR")
                .help("Where consumed inputs are moved [default: DIR/processed]")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("recursive")
                .short('r')
                .long("recursive")
                .help("Also scan subdirectories of DIR")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ffmpeg")
                .long("ffmpeg")
                .value_name("PROGRAM")
                .help("Program used to cut and tag tracks")
                .default_value(chaptersplit_core::DEFAULT_EXTRACTOR_PROGRAM),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("DURATION")
                .help("Give up on a single track after this long (e.g. 90s, 5m)")
                .value_parser(ValueParser::new(parse_timeout)),
        )
        .arg(
            Arg::new("fail-fast")
                .long("fail-fast")
                .help("Stop the whole run at the first track that fails to extract")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Print the planned tracks without writing or moving files")
                .action(ArgAction::SetTrue),
        )
}
