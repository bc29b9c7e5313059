//! Sidecar metadata descriptors.
//!
//! A descriptor is the `.info.json` document written next to each downloaded
//! recording. Only a handful of fields are consumed; everything else in the
//! document is ignored.

use std::fs;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::SplitError;

/// The fields of a sidecar descriptor that drive track planning.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct MetadataDescriptor {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub playlist_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_index")]
    pub playlist_index: Option<u32>,
    /// Absent, `null` and `[]` all mean the recording is not chaptered.
    #[serde(default, deserialize_with = "nullable_chapters")]
    pub chapters: Vec<ChapterDescriptor>,
}

/// One chapter of a recording, in seconds from the start of the audio.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ChapterDescriptor {
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub start_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
}

impl MetadataDescriptor {
    pub fn is_chaptered(&self) -> bool {
        !self.chapters.is_empty()
    }
}

impl std::str::FromStr for MetadataDescriptor {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// Read and parse the descriptor at `path`.
///
/// Read and parse failures name the offending path so the caller can skip
/// the recording and keep going.
pub fn parse_descriptor(path: &Path) -> Result<MetadataDescriptor, SplitError> {
    let text = fs::read_to_string(path).map_err(|source| SplitError::ReadDescriptor {
        path: path.to_path_buf(),
        source,
    })?;

    text.parse().map_err(|source| SplitError::ParseDescriptor {
        path: path.to_path_buf(),
        source,
    })
}

fn nullable_chapters<'de, D>(deserializer: D) -> Result<Vec<ChapterDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ChapterDescriptor>>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| de::Error::custom("time is not representable as f64")),
        Some(Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|seconds| seconds.is_finite())
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid time '{text}'"))),
        Some(other) => Err(de::Error::custom(format!("invalid time {other}"))),
    }
}

const MAX_INDEX: f64 = u32::MAX as f64;

/// Anything that is not a whole number in `0..=u32::MAX` counts as absent;
/// the index only ever feeds a fallback track number.
fn lenient_index<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let index = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_f64().and_then(whole_index),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok().and_then(whole_index),
        _ => None,
    };
    Ok(index)
}

fn whole_index(value: f64) -> Option<u32> {
    (value.fract() == 0.0 && (0.0..=MAX_INDEX).contains(&value)).then(|| value as u32)
}
