//! Chapter model and the NFO chapter pipeline
//!
//! This module holds the chapter value type shared by every component, plus the
//! parser, writer and reconciler that move chapters between NFO sidecars and the
//! persisted chapter store.

pub mod parser;
pub mod reconcile;
pub mod writer;

// Re-export main types
pub use parser::NfoChapterParser;
pub use reconcile::{reconcile, reconcile_for_save, reconcile_for_scan, Reconciliation, ReconcileDirection};
pub use writer::NfoDocument;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of ticks in one second (1 tick = 100 nanoseconds)
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Spacing of auto-generated placeholder chapters (5 minutes)
pub const DUMMY_CHAPTER_INTERVAL_TICKS: i64 = 5 * 60 * TICKS_PER_SECOND;

/// A single chapter marker of a video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterRecord {
    /// Chapter name, trimmed and never empty
    pub name: String,
    /// Start position in ticks
    pub start_ticks: i64,
    /// Path of the chapter thumbnail
    pub image_path: Option<String>,
    /// Last write time of the thumbnail file
    pub image_last_modified: Option<DateTime<Utc>>,
}

impl ChapterRecord {
    /// Create a chapter without an image
    pub fn new(name: impl Into<String>, start_ticks: i64) -> Self {
        Self {
            name: name.into(),
            start_ticks,
            image_path: None,
            image_last_modified: None,
        }
    }

    /// Set the image path
    pub fn with_image(mut self, image_path: impl Into<String>) -> Self {
        self.image_path = Some(image_path.into());
        self
    }

    /// Start position in seconds
    pub fn start_seconds(&self) -> f64 {
        ticks_to_seconds(self.start_ticks)
    }

    /// Whether `other` refers to the same chapter (same name and start)
    pub fn same_key(&self, other: &ChapterRecord) -> bool {
        self.name == other.name && self.start_ticks == other.start_ticks
    }

    /// Image path, treating an empty string like a missing one
    pub fn image(&self) -> Option<&str> {
        self.image_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// Convert decimal seconds to ticks, rounded to the nearest tick
pub fn seconds_to_ticks(seconds: f64) -> i64 {
    (seconds * TICKS_PER_SECOND as f64).round() as i64
}

/// Convert ticks to decimal seconds
pub fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// Detect whether a chapter list looks like auto-generated placeholder chapters.
///
/// Placeholders are spaced at exactly [`DUMMY_CHAPTER_INTERVAL_TICKS`] starting from
/// any origin. Empty and single-chapter lists count as dummies.
pub fn is_dummy(chapters: &[ChapterRecord]) -> bool {
    let mut offsets = chapters
        .iter()
        .enumerate()
        .map(|(i, c)| c.start_ticks.wrapping_sub((i as i64).wrapping_mul(DUMMY_CHAPTER_INTERVAL_TICKS)));

    match offsets.next() {
        Some(first) => offsets.all(|offset| offset == first),
        None => true,
    }
}

/// Full-field equality used for "nothing changed" checks (not for matching)
pub fn records_equal(a: &ChapterRecord, b: &ChapterRecord) -> bool {
    a.name == b.name && a.start_ticks == b.start_ticks && a.image_path == b.image_path
}
