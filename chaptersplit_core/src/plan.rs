//! Track planning.
//!
//! Turns a parsed descriptor into the ordered list of tracks that should be
//! produced from one recording: one per chapter, or a single track for a
//! recording without chapters.

use crate::descriptor::{ChapterDescriptor, MetadataDescriptor};
use crate::SplitError;

pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// One track to produce from a recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackPlan {
    /// Whole seconds, set only for chapter-mode plans.
    pub start_seconds: Option<i64>,
    /// Whole seconds, set only for chapter-mode plans.
    pub end_seconds: Option<i64>,
    pub album: String,
    pub artist: String,
    pub title: String,
    /// 1-based.
    pub track_number: u32,
    pub is_chaptered: bool,
}

impl TrackPlan {
    /// The `(start, end)` range to cut, if this plan covers a chapter.
    pub fn range(&self) -> Option<(i64, i64)> {
        match (self.start_seconds, self.end_seconds) {
            (Some(start), Some(end)) if self.is_chaptered => Some((start, end)),
            _ => None,
        }
    }

    /// Reject chapter ranges that cannot be cut.
    ///
    /// A chapter must start at or after zero and end after it starts.
    /// Single-track plans are always valid.
    pub fn validate(&self) -> Result<(), SplitError> {
        match self.range() {
            Some((start, end)) if start < 0 || end <= start => {
                Err(SplitError::InvalidChapterRange {
                    track: self.track_number,
                    title: self.title.clone(),
                    start,
                    end,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Build the ordered track plans for `descriptor`.
///
/// No validation happens here: every chapter yields a plan, whatever its
/// bounds or title.
pub fn build_plans(descriptor: &MetadataDescriptor) -> Vec<TrackPlan> {
    if descriptor.is_chaptered() {
        descriptor
            .chapters
            .iter()
            .enumerate()
            .map(|(index, chapter)| chapter_plan(descriptor, chapter, index))
            .collect()
    } else {
        vec![single_plan(descriptor)]
    }
}

fn chapter_plan(
    descriptor: &MetadataDescriptor,
    chapter: &ChapterDescriptor,
    index: usize,
) -> TrackPlan {
    TrackPlan {
        start_seconds: Some(whole_seconds(chapter.start_time)),
        end_seconds: Some(whole_seconds(chapter.end_time)),
        album: or_default(&descriptor.title, UNKNOWN_ALBUM),
        artist: or_default(&descriptor.uploader, UNKNOWN_ARTIST),
        title: or_default(&chapter.title, UNKNOWN_TITLE),
        track_number: u32::try_from(index + 1).unwrap_or(u32::MAX),
        is_chaptered: true,
    }
}

fn single_plan(descriptor: &MetadataDescriptor) -> TrackPlan {
    let album = descriptor
        .playlist_title
        .as_ref()
        .or(descriptor.title.as_ref())
        .map_or_else(|| UNKNOWN_ALBUM.to_owned(), Clone::clone);

    TrackPlan {
        start_seconds: None,
        end_seconds: None,
        album,
        artist: or_default(&descriptor.uploader, UNKNOWN_ARTIST),
        title: or_default(&descriptor.title, UNKNOWN_TITLE),
        track_number: descriptor.playlist_index.filter(|n| *n > 0).unwrap_or(1),
        is_chaptered: false,
    }
}

fn or_default(value: &Option<String>, fallback: &str) -> String {
    value.clone().unwrap_or_else(|| fallback.to_owned())
}

// Floor, so 12.9 becomes 12 and a missing bound becomes 0.
fn whole_seconds(time: Option<f64>) -> i64 {
    time.unwrap_or(0.0).floor() as i64
}
