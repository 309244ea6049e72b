//! NFO Chapters - chapter sync between NFO sidecars and a media library
//!
//! Imports chapter markers from movie NFO files into a persisted chapter store,
//! writes persisted chapters back into the NFO files, and extracts chapter
//! thumbnails to the image paths the NFO files name.

pub mod chapters;
pub mod config;
pub mod error;
pub mod extraction;
pub mod library;
pub mod saver;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for easy access
pub use crate::chapters::{
    is_dummy, records_equal, seconds_to_ticks, ticks_to_seconds, ChapterRecord, NfoChapterParser, NfoDocument,
    ReconcileDirection, Reconciliation, DUMMY_CHAPTER_INTERVAL_TICKS, TICKS_PER_SECOND,
};
pub use crate::config::{ChapterSyncConfig, Config, ConfigBuilder, MetadataConfig};
pub use crate::error::{ChapterSyncError, Result};
pub use crate::extraction::{ChapterImageExtractor, ExtractionOptions};
pub use crate::library::{
    Catalog, ChapterStore, ExtractionEngine, FileSystem, ItemId, ItemQuery, ItemUpdateType, MetadataSaver, VideoItem,
};
pub use crate::saver::{ChapterNfoSaver, SaveOutcome};
pub use crate::tasks::{ExtractImagesTask, PostScanTask, ProgressReporter, TaskSummary};
