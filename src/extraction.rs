//! Chapter image extraction that keeps user-chosen image locations
//!
//! The extraction engine always writes thumbnails into the item's internal
//! metadata folder. When a chapter already pointed somewhere else (typically an
//! image path imported from an NFO sidecar), the fresh thumbnail is copied over
//! that file and the chapter keeps its original path.

use crate::chapters::{is_dummy, ChapterRecord};
use crate::error::{ChapterSyncError, Result};
use crate::library::paths::chapter_images_path;
use crate::library::{ChapterStore, ExtractionEngine, FileSystem, VideoItem};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Flags for one extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Produce missing thumbnails
    pub extract_images: bool,
    /// Let the engine persist the chapters it updates
    pub save_chapters: bool,
    /// Delete existing internal thumbnails first
    pub force_replace: bool,
}

/// Runs the extraction engine and moves its output to the chapters' own paths
#[derive(Clone)]
pub struct ChapterImageExtractor {
    engine: Arc<dyn ExtractionEngine>,
    store: Arc<dyn ChapterStore>,
    fs: Arc<dyn FileSystem>,
}

impl ChapterImageExtractor {
    pub fn new(
        engine: Arc<dyn ExtractionEngine>,
        store: Arc<dyn ChapterStore>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self { engine, store, fs }
    }

    /// Refresh chapter thumbnails for `item`.
    ///
    /// Returns `Ok(false)` when the engine reports failure; nothing is persisted
    /// by this controller in that case.
    pub async fn refresh_chapter_images(
        &self,
        item: &VideoItem,
        chapters: &mut [ChapterRecord],
        options: ExtractionOptions,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if is_dummy(chapters) {
            debug!("Skipping placeholder chapters of {}", item.name);
            return Ok(true);
        }

        let original_paths: Vec<Option<String>> =
            chapters.iter().map(|c| c.image_path.clone()).collect();

        if options.force_replace {
            self.clear_internal_images(item);
        }

        let success = self
            .engine
            .refresh_chapter_images(
                item,
                chapters,
                options.extract_images,
                options.save_chapters,
                cancel,
            )
            .await?;

        if !success {
            warn!("Chapter image extraction failed for {}", item.name);
            return Ok(false);
        }

        let mut corrected = false;
        for (chapter, original) in chapters.iter_mut().zip(original_paths) {
            let original = match original.filter(|p| !p.is_empty()) {
                Some(original) => original,
                None => continue,
            };

            if chapter.image_path.as_deref() == Some(original.as_str()) {
                continue;
            }

            if let Some(extracted) = chapter.image() {
                self.fs
                    .copy_file(Path::new(extracted), Path::new(&original))
                    .map_err(|e| {
                        ChapterSyncError::Extraction(format!(
                            "failed to copy {} to {}: {}",
                            extracted, original, e
                        ))
                    })?;
                debug!("🖼️ Copied {} over {}", extracted, original);
            }

            chapter.image_last_modified = self.fs.last_write_time_utc(Path::new(&original));
            chapter.image_path = Some(original);
            corrected = true;
        }

        if corrected {
            self.store.save(&item.id, chapters).await?;
            info!("💾 Restored chapter image paths for {}", item.name);
        }

        Ok(true)
    }

    fn clear_internal_images(&self, item: &VideoItem) {
        let images_dir = chapter_images_path(item);
        let existing = if self.fs.directory_exists(&images_dir) {
            self.fs.file_paths(&images_dir).unwrap_or_else(|e| {
                warn!("Could not list {}: {}", images_dir.display(), e);
                Vec::new()
            })
        } else {
            Vec::new()
        };

        for path in &existing {
            if let Err(e) = self.fs.delete_file(path) {
                warn!("Failed to delete chapter image {}: {}", path.display(), e);
            }
        }

        if !existing.is_empty() {
            debug!("Deleted {} chapter images of {}", existing.len(), item.name);
            self.fs.invalidate_directory_cache(&images_dir);
        }
    }
}
