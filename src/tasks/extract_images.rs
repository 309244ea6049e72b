//! Scheduled chapter image extraction to NFO-specified paths

use super::{run_items, ProgressReporter, ScanOutcome, TaskSummary};
use crate::chapters::records_equal;
use crate::config::ChapterSyncConfig;
use crate::error::{ChapterSyncError, Result};
use crate::extraction::{ChapterImageExtractor, ExtractionOptions};
use crate::library::{Catalog, ChapterStore, ExtractionEngine, FileSystem, ItemQuery, VideoItem};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct ExtractImagesTask {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn ChapterStore>,
    extractor: ChapterImageExtractor,
    config: ChapterSyncConfig,
}

impl ExtractImagesTask {
    pub const NAME: &'static str = "Extract chapter images to NFO paths";

    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn ChapterStore>,
        fs: Arc<dyn FileSystem>,
        engine: Arc<dyn ExtractionEngine>,
        config: ChapterSyncConfig,
    ) -> Self {
        Self {
            extractor: ChapterImageExtractor::new(engine, store.clone(), fs),
            catalog,
            store,
            config,
        }
    }

    pub async fn run(&self, progress: &dyn ProgressReporter, cancel: &CancellationToken) -> Result<TaskSummary> {
        if !self.config.extract_to_paths {
            warn!("Chapter image extraction to NFO paths is disabled, not running {}", Self::NAME);
            return Ok(TaskSummary::default());
        }

        let videos = self.catalog.items(&ItemQuery::extractable_videos())?;
        let options = ExtractionOptions {
            extract_images: true,
            save_chapters: true,
            force_replace: self.config.force_replace,
        };

        info!("🖼️ Extracting chapter images for {} videos", videos.len());
        run_items(Self::NAME, &videos, progress, cancel, |video| {
            self.process_video(video, options, cancel)
        })
        .await
    }

    async fn process_video(
        &self,
        video: &VideoItem,
        options: ExtractionOptions,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome> {
        let mut chapters = self.store.get(&video.id).await?;
        if chapters.is_empty() {
            return Ok(ScanOutcome::Skipped);
        }

        let before = chapters.clone();
        let success = self
            .extractor
            .refresh_chapter_images(video, &mut chapters, options, cancel)
            .await?;

        if !success {
            return Err(ChapterSyncError::Extraction(format!(
                "engine could not refresh chapter images for {}",
                video.name
            )));
        }

        let changed = chapters.len() != before.len()
            || chapters.iter().zip(&before).any(|(a, b)| !records_equal(a, b));

        if changed {
            Ok(ScanOutcome::Updated)
        } else {
            Ok(ScanOutcome::Unchanged)
        }
    }
}
