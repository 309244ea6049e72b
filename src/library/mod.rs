//! Library items and the collaborator traits the chapter sync core calls
//!
//! Everything the core needs from its host (item catalog, persisted chapters,
//! frame extraction, file system primitives) is expressed as a trait here. Local
//! implementations live in the submodules.

pub mod ffmpeg;
pub mod local;
pub mod paths;
pub mod store;

pub use ffmpeg::FfmpegExtractionEngine;
pub use local::{LocalFileSystem, SkeletonNfoWriter, WalkdirCatalog};
pub use store::{JsonChapterStore, MemoryChapterStore};

use crate::chapters::ChapterRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Stable identifier of a library item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an id from the media path (md5 hex of the path)
    pub fn from_path(path: &Path) -> Self {
        let digest = md5::compute(path.to_string_lossy().as_bytes());
        Self(format!("{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Container layout of a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoType {
    VideoFile,
    Iso,
    Dvd,
    BluRay,
}

/// Kind of library item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Movie,
    Episode,
    MusicVideo,
    Video,
}

/// Where an item comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Library,
    Channel,
    LiveTv,
}

/// Plain view of a video item with the fields chapter sync needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoItem {
    pub id: ItemId,
    pub name: String,
    /// Media path (file, or folder for disc layouts)
    pub path: PathBuf,
    /// Folder holding the media
    pub containing_folder_path: PathBuf,
    /// Item-private metadata folder (chapter thumbnails live below it)
    pub internal_metadata_path: PathBuf,
    pub kind: ItemKind,
    pub video_type: VideoType,
    pub source_type: SourceType,
    pub is_placeholder: bool,
    /// Whether the folder holds more than one video
    pub is_in_mixed_folder: bool,
    pub is_virtual: bool,
    pub is_folder: bool,
    pub supports_local_metadata: bool,
    /// Set for trailers, behind-the-scenes clips and other extras
    pub extra_type: Option<String>,
    /// Runtime in ticks, when known
    pub runtime_ticks: Option<i64>,
}

impl VideoItem {
    /// Build an item for a media path inside a library folder
    pub fn new(path: PathBuf, internal_metadata_root: &Path) -> Self {
        let id = ItemId::from_path(&path);
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let containing_folder_path = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let prefix: String = id.as_str().chars().take(2).collect();
        let internal_metadata_path = internal_metadata_root.join(prefix).join(id.as_str());

        Self {
            id,
            name,
            path,
            containing_folder_path,
            internal_metadata_path,
            kind: ItemKind::Movie,
            video_type: VideoType::VideoFile,
            source_type: SourceType::Library,
            is_placeholder: false,
            is_in_mixed_folder: false,
            is_virtual: false,
            is_folder: false,
            supports_local_metadata: true,
            extra_type: None,
            runtime_ticks: None,
        }
    }

    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark the item as a disc folder; the folder itself becomes the containing path
    pub fn with_disc_layout(mut self, video_type: VideoType) -> Self {
        self.video_type = video_type;
        if matches!(video_type, VideoType::Dvd | VideoType::BluRay) {
            self.containing_folder_path = self.path.clone();
            if let Some(name) = self.path.file_name().and_then(|s| s.to_str()) {
                self.name = name.to_string();
            }
        }
        self
    }

    pub fn with_mixed_folder(mut self, mixed: bool) -> Self {
        self.is_in_mixed_folder = mixed;
        self
    }

    pub fn with_runtime_ticks(mut self, ticks: i64) -> Self {
        self.runtime_ticks = Some(ticks);
        self
    }
}

/// Filter for catalog lookups
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    /// Accepted kinds; empty accepts all
    pub kinds: Vec<ItemKind>,
    /// Accepted sources; empty accepts all
    pub source_types: Vec<SourceType>,
    pub is_virtual: Option<bool>,
    pub is_folder: Option<bool>,
    pub recursive: bool,
}

impl ItemQuery {
    /// All movies in the library
    pub fn movies() -> Self {
        Self {
            kinds: vec![ItemKind::Movie],
            recursive: true,
            ..Self::default()
        }
    }

    /// Physical, library-sourced videos eligible for chapter image extraction
    pub fn extractable_videos() -> Self {
        Self {
            kinds: Vec::new(),
            source_types: vec![SourceType::Library],
            is_virtual: Some(false),
            is_folder: Some(false),
            recursive: true,
        }
    }

    /// Whether an item passes this filter
    pub fn matches(&self, item: &VideoItem) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&item.kind))
            && (self.source_types.is_empty() || self.source_types.contains(&item.source_type))
            && self.is_virtual.map_or(true, |v| v == item.is_virtual)
            && self.is_folder.map_or(true, |f| f == item.is_folder)
    }
}

/// Why an item is being saved; ordered by significance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemUpdateType {
    None,
    FileChange,
    MetadataImport,
    MetadataDownload,
    ImageUpdate,
    MetadataEdit,
}

/// Library catalog queries
pub trait Catalog: Send + Sync {
    fn items(&self, query: &ItemQuery) -> Result<Vec<VideoItem>>;
}

/// Persisted per-item chapter records
#[async_trait]
pub trait ChapterStore: Send + Sync {
    async fn get(&self, item_id: &ItemId) -> Result<Vec<ChapterRecord>>;

    async fn save(&self, item_id: &ItemId, chapters: &[ChapterRecord]) -> Result<()>;
}

/// Frame extraction producing chapter thumbnails
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Refresh thumbnails for `chapters`, pointing their image paths at the
    /// produced files. Returns `false` when extraction did not succeed.
    async fn refresh_chapter_images(
        &self,
        item: &VideoItem,
        chapters: &mut [ChapterRecord],
        extract_images: bool,
        save_chapters: bool,
        cancel: &CancellationToken,
    ) -> Result<bool>;
}

/// Host metadata writer used to create a base NFO when none exists yet
#[async_trait]
pub trait MetadataSaver: Send + Sync {
    async fn save_base_metadata(&self, item: &VideoItem) -> Result<()>;
}

/// File system primitives
pub trait FileSystem: Send + Sync {
    fn file_exists(&self, path: &Path) -> bool;

    fn directory_exists(&self, path: &Path) -> bool;

    fn last_write_time_utc(&self, path: &Path) -> Option<DateTime<Utc>>;

    fn delete_file(&self, path: &Path) -> io::Result<()>;

    /// Copy `from` over `to`, replacing an existing file
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn set_attributes(&self, path: &Path, hidden: bool, read_only: bool) -> io::Result<()>;

    fn set_hidden(&self, path: &Path, hidden: bool) -> io::Result<()>;

    /// List files in a directory; listings may be served from a cache
    fn file_paths(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Drop any cached listing for `dir`
    fn invalidate_directory_cache(&self, dir: &Path);
}
