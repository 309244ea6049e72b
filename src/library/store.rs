//! Persisted chapter stores
use super::{ChapterStore, ItemId};
use crate::chapters::ChapterRecord;
use crate::error::{ChapterSyncError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Chapter store keeping one JSON file per item
#[derive(Debug, Clone)]
pub struct JsonChapterStore {
    store_dir: PathBuf,
}

impl JsonChapterStore {
    pub fn new(store_dir: PathBuf) -> Self {
        Self { store_dir }
    }

    /// Create the store directory
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.store_dir).await?;
        debug!("📁 Chapter store directory initialized: {}", self.store_dir.display());
        Ok(())
    }

    fn item_path(&self, item_id: &ItemId) -> PathBuf {
        self.store_dir.join(format!("{}.json", item_id))
    }
}

#[async_trait]
impl ChapterStore for JsonChapterStore {
    async fn get(&self, item_id: &ItemId) -> Result<Vec<ChapterRecord>> {
        let path = self.item_path(item_id);

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(ChapterSyncError::Store(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn save(&self, item_id: &ItemId, chapters: &[ChapterRecord]) -> Result<()> {
        tokio::fs::create_dir_all(&self.store_dir).await?;

        let path = self.item_path(item_id);
        let tmp_path = path.with_extension("json.tmp");
        let json_content = serde_json::to_string_pretty(chapters)?;

        tokio::fs::write(&tmp_path, json_content).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!("💾 Saved {} chapters for item {}", chapters.len(), item_id);
        Ok(())
    }
}

/// In-memory chapter store
#[derive(Debug, Default)]
pub struct MemoryChapterStore {
    chapters: Mutex<HashMap<ItemId, Vec<ChapterRecord>>>,
    save_count: Mutex<usize>,
}

impl MemoryChapterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed chapters without counting a save
    pub fn insert(&self, item_id: ItemId, chapters: Vec<ChapterRecord>) {
        self.chapters.lock().insert(item_id, chapters);
    }

    /// Chapters currently stored for an item
    pub fn snapshot(&self, item_id: &ItemId) -> Vec<ChapterRecord> {
        self.chapters.lock().get(item_id).cloned().unwrap_or_default()
    }

    /// Number of `save` calls so far
    pub fn save_count(&self) -> usize {
        *self.save_count.lock()
    }
}

#[async_trait]
impl ChapterStore for MemoryChapterStore {
    async fn get(&self, item_id: &ItemId) -> Result<Vec<ChapterRecord>> {
        Ok(self.snapshot(item_id))
    }

    async fn save(&self, item_id: &ItemId, chapters: &[ChapterRecord]) -> Result<()> {
        self.chapters.lock().insert(item_id.clone(), chapters.to_vec());
        *self.save_count.lock() += 1;
        Ok(())
    }
}
