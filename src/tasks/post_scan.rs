//! Imports NFO chapters into the chapter store after a library scan

use super::{run_items, ProgressReporter, ScanOutcome, TaskSummary};
use crate::chapters::{reconcile_for_scan, NfoChapterParser};
use crate::config::ChapterSyncConfig;
use crate::error::Result;
use crate::extraction::{ChapterImageExtractor, ExtractionOptions};
use crate::library::paths::find_sidecar;
use crate::library::{Catalog, ChapterStore, ExtractionEngine, FileSystem, ItemQuery, VideoItem};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Post-scan pass over all movies
pub struct PostScanTask {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn ChapterStore>,
    fs: Arc<dyn FileSystem>,
    parser: NfoChapterParser,
    extractor: ChapterImageExtractor,
    config: ChapterSyncConfig,
}

impl PostScanTask {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn ChapterStore>,
        fs: Arc<dyn FileSystem>,
        engine: Arc<dyn ExtractionEngine>,
        config: ChapterSyncConfig,
    ) -> Self {
        Self {
            parser: NfoChapterParser::new(fs.clone()),
            extractor: ChapterImageExtractor::new(engine, store.clone(), fs.clone()),
            catalog,
            store,
            fs,
            config,
        }
    }

    pub async fn run(&self, progress: &dyn ProgressReporter, cancel: &CancellationToken) -> Result<TaskSummary> {
        info!("📖 Running the movie NFO chapter import");
        let movies = self.catalog.items(&ItemQuery::movies())?;

        run_items("NFO chapter import", &movies, progress, cancel, |movie| {
            self.process_movie(movie, cancel)
        })
        .await
    }

    async fn process_movie(&self, movie: &VideoItem, cancel: &CancellationToken) -> Result<ScanOutcome> {
        let sidecar_path = match find_sidecar(movie, self.fs.as_ref()) {
            Some(path) => path,
            None => {
                debug!("No NFO found for {}", movie.name);
                return Ok(ScanOutcome::Skipped);
            }
        };

        let sidecar = match self.parser.parse_file(&sidecar_path, cancel).await {
            Ok(Some(chapters)) if !chapters.is_empty() => chapters,
            Ok(_) => {
                debug!("No chapters in {}", sidecar_path.display());
                return Ok(ScanOutcome::Skipped);
            }
            Err(e) if e.is_no_data() => {
                warn!("Ignoring unreadable NFO {}: {}", sidecar_path.display(), e);
                return Ok(ScanOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        let persisted = self.store.get(&movie.id).await?;
        let reconciliation = reconcile_for_scan(&persisted, &sidecar);

        let outcome = if reconciliation.server_changed {
            self.store.save(&movie.id, &reconciliation.chapters).await?;
            info!("💾 Imported {} NFO chapters for {}", reconciliation.chapters.len(), movie.name);
            ScanOutcome::Updated
        } else {
            ScanOutcome::Unchanged
        };

        if self.config.extract_to_paths && !self.config.use_own_task {
            let mut chapters = reconciliation.chapters;
            let options = ExtractionOptions {
                extract_images: true,
                save_chapters: true,
                force_replace: false,
            };

            if !self
                .extractor
                .refresh_chapter_images(movie, &mut chapters, options, cancel)
                .await?
            {
                warn!("Failed to extract chapter images for {}", movie.name);
            }
        }

        Ok(outcome)
    }
}
