//! Writes persisted chapters into movie NFO sidecars
//!
//! Saving is a merge, not an overwrite: chapter entries the user added to the
//! sidecar by hand (or image paths they changed there) are folded back into
//! the chapter store before the sidecar is rewritten from the merged list.

use crate::chapters::{is_dummy, reconcile_for_save, NfoDocument};
use crate::config::MetadataConfig;
use crate::error::{ChapterSyncError, Result};
use crate::library::paths::sidecar_save_path;
use crate::library::{ChapterStore, FileSystem, ItemKind, ItemUpdateType, MetadataSaver, VideoItem};
use fs4::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// What a save did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No real chapters to export
    Skipped,
    /// No sidecar exists and none could be created
    MissingSidecar(PathBuf),
    Saved {
        sidecar_rewritten: bool,
        store_updated: bool,
    },
}

/// Sidecar locks shared by every saver in the process
static FILE_LOCKS: LazyLock<FileLocks> = LazyLock::new(FileLocks::default);

/// Exclusive per-path locks held across a read-merge-write cycle
#[derive(Debug, Default)]
struct FileLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileLocks {
    async fn acquire(&'static self, path: &Path) -> FileLockGuard {
        let lock = self
            .locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone();
        let guard = lock.clone().lock_owned().await;

        FileLockGuard {
            registry: self,
            path: path.to_path_buf(),
            lock,
            _guard: guard,
        }
    }

    #[cfg(test)]
    fn is_tracked(&self, path: &Path) -> bool {
        self.locks.lock().contains_key(path)
    }
}

/// Held path lock; the registry entry goes away with its last holder
struct FileLockGuard {
    registry: &'static FileLocks,
    path: PathBuf,
    lock: Arc<tokio::sync::Mutex<()>>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let mut locks = self.registry.locks.lock();
        // registry entry, `self.lock` and the owned guard
        if Arc::strong_count(&self.lock) == 3 {
            locks.remove(&self.path);
        }
    }
}

/// Open a sidecar for read/write and hold an exclusive OS lock on it until dropped
async fn open_exclusive(path: &Path) -> Result<tokio::fs::File> {
    let file = tokio::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .await?
        .into_std()
        .await;

    let file = tokio::task::spawn_blocking(move || file.lock_exclusive().map(|()| file))
        .await
        .map_err(io::Error::other)??;

    Ok(tokio::fs::File::from_std(file))
}

/// Metadata saver exporting chapters to movie NFO files
#[derive(Clone)]
pub struct ChapterNfoSaver {
    store: Arc<dyn ChapterStore>,
    fs: Arc<dyn FileSystem>,
    base_saver: Arc<dyn MetadataSaver>,
    options: MetadataConfig,
}

impl ChapterNfoSaver {
    pub const NAME: &'static str = "ChapterNfoSaver";

    pub fn new(
        store: Arc<dyn ChapterStore>,
        fs: Arc<dyn FileSystem>,
        base_saver: Arc<dyn MetadataSaver>,
        options: MetadataConfig,
    ) -> Self {
        Self {
            store,
            fs,
            base_saver,
            options,
        }
    }

    fn minimum_update_type(&self) -> ItemUpdateType {
        if self.options.save_image_paths_in_nfo {
            ItemUpdateType::ImageUpdate
        } else {
            ItemUpdateType::MetadataDownload
        }
    }

    /// Whether an update of `item` should trigger an NFO save
    pub fn is_enabled_for(&self, item: &VideoItem, update_type: ItemUpdateType) -> bool {
        item.supports_local_metadata
            && item.kind != ItemKind::Episode
            && item.extra_type.is_none()
            && update_type >= self.minimum_update_type()
    }

    /// Sidecar path written for `item`
    pub fn save_path(&self, item: &VideoItem) -> PathBuf {
        sidecar_save_path(item)
    }

    /// Merge persisted chapters with the item's sidecar and write back both sides as needed
    pub async fn save(&self, item: &VideoItem, cancel: &CancellationToken) -> Result<SaveOutcome> {
        let mut chapters = self.store.get(&item.id).await?;

        if chapters.is_empty() || is_dummy(&chapters) {
            debug!("No chapters worth saving for {}", item.name);
            return Ok(SaveOutcome::Skipped);
        }

        let path = self.save_path(item);

        if !self.fs.file_exists(&path) {
            self.base_saver.save_base_metadata(item).await?;

            if !self.fs.file_exists(&path) {
                error!("Failed to save {}: the NFO file was not found at {}", item.name, path.display());
                return Ok(SaveOutcome::MissingSidecar(path));
            }
        }

        if cancel.is_cancelled() {
            return Err(ChapterSyncError::Cancelled);
        }

        if let Err(e) = self.fs.set_attributes(&path, false, false) {
            error!("Error clearing attributes on {}: {}", path.display(), e);
        }

        let (sidecar_rewritten, store_updated) = {
            let _lock = FILE_LOCKS.acquire(&path).await;
            let mut file = open_exclusive(&path).await?;

            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes).await?;
            let text = String::from_utf8(bytes).map_err(|e| {
                ChapterSyncError::MalformedDocument(format!("{} is not UTF-8: {}", path.display(), e))
            })?;
            let mut doc = NfoDocument::parse(&text)?;

            let sidecar = doc.sidecar_chapters()?;
            let (server_changed, needs_rewrite) = reconcile_for_save(&mut chapters, &sidecar);

            if needs_rewrite {
                if cancel.is_cancelled() {
                    return Err(ChapterSyncError::Cancelled);
                }

                doc.set_chapters(&chapters)?;
                file.seek(SeekFrom::Start(0)).await?;
                file.set_len(0).await?;
                file.write_all(doc.as_str().as_bytes()).await?;
                file.flush().await?;
                info!("📝 Wrote {} chapters to {}", chapters.len(), path.display());
            }

            if server_changed {
                self.store.save(&item.id, &chapters).await?;
                info!("💾 Merged NFO chapters of {} into the chapter store", item.name);
            }

            (needs_rewrite, server_changed)
        };

        if self.options.save_metadata_hidden {
            if let Err(e) = self.fs.set_hidden(&path, true) {
                error!("Error setting hidden attribute on {}: {}", path.display(), e);
            }
        }

        Ok(SaveOutcome::Saved {
            sidecar_rewritten,
            store_updated,
        })
    }
}
