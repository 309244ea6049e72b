//! Chapter thumbnail extraction through the ffmpeg command line
use super::paths::{chapter_image_path, chapter_images_path};
use super::{ChapterStore, ExtractionEngine, FileSystem, VideoItem, VideoType};
use crate::chapters::{ticks_to_seconds, ChapterRecord};
use crate::error::{ChapterSyncError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Extraction engine writing one JPEG per chapter into the item's internal folder
#[derive(Clone)]
pub struct FfmpegExtractionEngine {
    ffmpeg_path: PathBuf,
    fs: Arc<dyn FileSystem>,
    store: Arc<dyn ChapterStore>,
}

impl FfmpegExtractionEngine {
    pub fn new(ffmpeg_path: PathBuf, fs: Arc<dyn FileSystem>, store: Arc<dyn ChapterStore>) -> Self {
        Self {
            ffmpeg_path,
            fs,
            store,
        }
    }

    /// Whether frames can be pulled from this item directly
    fn is_eligible(item: &VideoItem) -> bool {
        item.video_type == VideoType::VideoFile && !item.is_placeholder
    }

    async fn extract_frame(&self, video: &Path, start_ticks: i64, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let timestamp = format!("{:.3}", ticks_to_seconds(start_ticks));
        let status = tokio::process::Command::new(&self.ffmpeg_path)
            .arg("-ss")
            .arg(&timestamp)
            .arg("-i")
            .arg(video)
            .args(["-frames:v", "1", "-q:v", "2", "-y"])
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        if !status.success() {
            return Err(ChapterSyncError::Extraction(format!(
                "ffmpeg exited with {} for {} at {}s",
                status,
                video.display(),
                timestamp
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl ExtractionEngine for FfmpegExtractionEngine {
    async fn refresh_chapter_images(
        &self,
        item: &VideoItem,
        chapters: &mut [ChapterRecord],
        extract_images: bool,
        save_chapters: bool,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let extract_images = extract_images && Self::is_eligible(item);
        let images_dir = chapter_images_path(item);
        let current_images = if self.fs.directory_exists(&images_dir) {
            self.fs.file_paths(&images_dir).unwrap_or_default()
        } else {
            Vec::new()
        };

        let original = chapters.to_vec();
        let mut changes_made = false;

        for chapter in chapters.iter_mut() {
            if cancel.is_cancelled() {
                return Err(ChapterSyncError::Cancelled);
            }

            if let Some(runtime) = item.runtime_ticks {
                if chapter.start_ticks >= runtime {
                    info!(
                        "Stopping chapter extraction for {} because a chapter starts past the runtime",
                        item.name
                    );
                    break;
                }
            }

            let path = chapter_image_path(item, chapter.start_ticks);
            let path_str = path.to_string_lossy().into_owned();

            if !current_images.contains(&path) {
                if extract_images {
                    match self.extract_frame(&item.path, chapter.start_ticks, &path).await {
                        Ok(()) => {
                            debug!("🖼️ Extracted chapter image {}", path.display());
                            chapter.image_path = Some(path_str);
                            chapter.image_last_modified = self.fs.last_write_time_utc(&path);
                            changes_made = true;
                        }
                        Err(e) => {
                            warn!("Failed to extract chapter image for {}: {}", item.name, e);
                            chapters.clone_from_slice(&original);
                            self.fs.invalidate_directory_cache(&images_dir);
                            return Ok(false);
                        }
                    }
                } else if chapter.image_path.is_some() {
                    chapter.image_path = None;
                    changes_made = true;
                }
            } else if chapter.image_path.as_deref() != Some(path_str.as_str()) {
                chapter.image_path = Some(path_str);
                chapter.image_last_modified = self.fs.last_write_time_utc(&path);
                changes_made = true;
            }
        }

        if changes_made {
            self.fs.invalidate_directory_cache(&images_dir);
            if save_chapters {
                self.store.save(&item.id, chapters).await?;
            }
        }

        Ok(true)
    }
}
