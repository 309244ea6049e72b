//! In-memory collaborators for unit tests

use crate::chapters::ChapterRecord;
use crate::error::Result;
use crate::library::{ExtractionEngine, FileSystem, ItemId, VideoItem};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// File system over a set of paths that records every mutating call
#[derive(Debug, Default)]
pub struct FakeFileSystem {
    files: Mutex<BTreeSet<PathBuf>>,
    ops: Mutex<Vec<String>>,
    refuse_copies: bool,
}

impl FakeFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let fs = Self::default();
        fs.files.lock().extend(paths.into_iter().map(Into::into));
        fs
    }

    /// Make every `copy_file` fail
    pub fn refusing_copies(mut self) -> Self {
        self.refuse_copies = true;
        self
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().contains(path)
    }

    fn log(&self, op: String) {
        self.ops.lock().push(op);
    }

    pub fn modified_time() -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(1_700_000_000, 0).single()
    }
}

impl FileSystem for FakeFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        self.contains(path)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.files.lock().iter().any(|f| f.starts_with(path) && f != path)
    }

    fn last_write_time_utc(&self, path: &Path) -> Option<DateTime<Utc>> {
        if self.contains(path) {
            Self::modified_time()
        } else {
            None
        }
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        self.log(format!("delete {}", path.display()));
        if self.files.lock().remove(path) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.log(format!("copy {} -> {}", from.display(), to.display()));
        if self.refuse_copies {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "copy refused"));
        }
        self.files.lock().insert(to.to_path_buf());
        Ok(())
    }

    fn set_attributes(&self, path: &Path, hidden: bool, read_only: bool) -> io::Result<()> {
        self.log(format!(
            "attributes {} hidden={} read_only={}",
            path.display(),
            hidden,
            read_only
        ));
        Ok(())
    }

    fn set_hidden(&self, path: &Path, hidden: bool) -> io::Result<()> {
        self.log(format!("hidden {} {}", path.display(), hidden));
        Ok(())
    }

    fn file_paths(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .lock()
            .iter()
            .filter(|f| f.parent() == Some(dir))
            .cloned()
            .collect())
    }

    fn invalidate_directory_cache(&self, dir: &Path) {
        self.log(format!("invalidate {}", dir.display()));
    }
}

/// Extraction engine running a fixed mutation over the chapter list
pub struct ScriptedEngine {
    script: fn(&mut [ChapterRecord]) -> Result<bool>,
    calls: Mutex<Vec<(ItemId, bool, bool)>>,
}

impl ScriptedEngine {
    pub fn new(script: fn(&mut [ChapterRecord]) -> Result<bool>) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Engine that succeeds without touching any chapter
    pub fn noop() -> Self {
        Self::new(|_| Ok(true))
    }

    /// `(item, extract_images, save_chapters)` per call
    pub fn calls(&self) -> Vec<(ItemId, bool, bool)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ExtractionEngine for ScriptedEngine {
    async fn refresh_chapter_images(
        &self,
        item: &VideoItem,
        chapters: &mut [ChapterRecord],
        extract_images: bool,
        save_chapters: bool,
        _cancel: &CancellationToken,
    ) -> Result<bool> {
        self.calls
            .lock()
            .push((item.id.clone(), extract_images, save_chapters));
        (self.script)(chapters)
    }
}
