//! Local file system, catalog and base NFO writer
use super::paths::sidecar_save_path;
use super::{Catalog, FileSystem, ItemQuery, MetadataSaver, VideoItem, VideoType};
use crate::chapters::writer::escape_xml;
use crate::error::{ChapterSyncError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// std::fs backed file system with cached directory listings
#[derive(Debug, Default)]
pub struct LocalFileSystem {
    listing_cache: RwLock<HashMap<PathBuf, Vec<PathBuf>>>,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileSystem for LocalFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn last_write_time_utc(&self, path: &Path) -> Option<DateTime<Utc>> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to).map(|_| ())
    }

    fn set_attributes(&self, path: &Path, hidden: bool, read_only: bool) -> io::Result<()> {
        set_read_only(path, read_only)?;
        self.set_hidden(path, hidden)
    }

    fn set_hidden(&self, path: &Path, hidden: bool) -> io::Result<()> {
        // No portable hidden attribute; dot-prefixed names are the only hiding on unix
        debug!("Hidden flag ({}) not applied to {}", hidden, path.display());
        Ok(())
    }

    fn file_paths(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        if let Some(cached) = self.listing_cache.read().get(dir) {
            return Ok(cached.clone());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        self.listing_cache.write().insert(dir.to_path_buf(), files.clone());
        Ok(files)
    }

    fn invalidate_directory_cache(&self, dir: &Path) {
        self.listing_cache.write().remove(dir);
    }
}

#[cfg(unix)]
fn set_read_only(path: &Path, read_only: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    let mode = permissions.mode();
    let mode = if read_only { mode & !0o222 } else { mode | 0o200 };
    permissions.set_mode(mode);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn set_read_only(path: &Path, read_only: bool) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(read_only);
    fs::set_permissions(path, permissions)
}

/// Catalog built by walking library folders on disk
#[derive(Debug, Clone)]
pub struct WalkdirCatalog {
    roots: Vec<PathBuf>,
    metadata_dir: PathBuf,
    extensions: Vec<String>,
}

impl WalkdirCatalog {
    pub fn new(roots: Vec<PathBuf>, metadata_dir: PathBuf, extensions: Vec<String>) -> Self {
        Self {
            roots,
            metadata_dir,
            extensions: extensions.into_iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect(),
        }
    }

    fn is_video_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| self.extensions.contains(&e.to_lowercase()))
    }

    fn scan_root(&self, root: &Path, recursive: bool) -> Vec<VideoItem> {
        let mut discs = Vec::new();
        let mut files: Vec<PathBuf> = Vec::new();

        let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(2);
        }

        let mut entries = walker.into_iter();
        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read library entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            let path = entry.path();

            if entry.file_type().is_dir() {
                if let Some(video_type) = disc_layout(path) {
                    if let Some(folder) = path.parent() {
                        discs.push(
                            VideoItem::new(folder.to_path_buf(), &self.metadata_dir).with_disc_layout(video_type),
                        );
                    }
                    entries.skip_current_dir();
                }
                continue;
            }

            if !recursive && entry.depth() > 1 {
                continue;
            }

            if self.is_video_file(path) {
                files.push(path.to_path_buf());
            }
        }

        let mut per_folder: HashMap<PathBuf, usize> = HashMap::new();
        for file in &files {
            if let Some(parent) = file.parent() {
                *per_folder.entry(parent.to_path_buf()).or_default() += 1;
            }
        }

        let mut items = discs;
        for file in files {
            let mixed = file
                .parent()
                .and_then(|p| per_folder.get(p))
                .map_or(false, |count| *count > 1);
            let is_iso = file
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.eq_ignore_ascii_case("iso"));

            let mut item = VideoItem::new(file, &self.metadata_dir).with_mixed_folder(mixed);
            if is_iso {
                item = item.with_disc_layout(VideoType::Iso);
            }
            items.push(item);
        }

        items
    }
}

/// Disc layout marked by a `VIDEO_TS` or `BDMV` folder
fn disc_layout(dir: &Path) -> Option<VideoType> {
    let name = dir.file_name()?.to_str()?;
    if name.eq_ignore_ascii_case("VIDEO_TS") {
        Some(VideoType::Dvd)
    } else if name.eq_ignore_ascii_case("BDMV") {
        Some(VideoType::BluRay)
    } else {
        None
    }
}

impl Catalog for WalkdirCatalog {
    fn items(&self, query: &ItemQuery) -> Result<Vec<VideoItem>> {
        let mut items = Vec::new();

        for root in &self.roots {
            if !root.is_dir() {
                warn!("Library folder does not exist: {}", root.display());
                continue;
            }

            items.extend(
                self.scan_root(root, query.recursive)
                    .into_iter()
                    .filter(|item| query.matches(item)),
            );
        }

        if items.is_empty() && self.roots.is_empty() {
            return Err(ChapterSyncError::Catalog("no library folders configured".to_string()));
        }

        debug!("📚 Catalog query matched {} items", items.len());
        Ok(items)
    }
}

/// Writes a minimal NFO so chapters have a document to live in
#[derive(Debug, Clone, Default)]
pub struct SkeletonNfoWriter;

#[async_trait]
impl MetadataSaver for SkeletonNfoWriter {
    async fn save_base_metadata(&self, item: &VideoItem) -> Result<()> {
        let path = sidecar_save_path(item);
        if path.exists() {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n<movie>\n  <title>{}</title>\n</movie>\n",
            escape_xml(&item.name)
        );
        tokio::fs::write(&path, xml).await?;
        info!("📝 Created base NFO: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        vec!["mkv".to_string(), ".MP4".to_string(), "iso".to_string()]
    }

    #[test]
    fn test_listing_cache_invalidation() {
        let temp_dir = TempDir::new().unwrap();
        let fs_impl = LocalFileSystem::new();
        std::fs::write(temp_dir.path().join("a.jpg"), b"a").unwrap();

        assert_eq!(fs_impl.file_paths(temp_dir.path()).unwrap().len(), 1);

        std::fs::write(temp_dir.path().join("b.jpg"), b"b").unwrap();
        assert_eq!(fs_impl.file_paths(temp_dir.path()).unwrap().len(), 1, "listing is cached");

        fs_impl.invalidate_directory_cache(temp_dir.path());
        assert_eq!(fs_impl.file_paths(temp_dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_copy_creates_parent_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let fs_impl = LocalFileSystem::new();
        let source = temp_dir.path().join("new.jpg");
        let target = temp_dir.path().join("nested").join("old.jpg");
        std::fs::write(&source, b"fresh").unwrap();

        fs_impl.copy_file(&source, &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"fresh");

        std::fs::write(&source, b"fresher").unwrap();
        fs_impl.copy_file(&source, &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"fresher");
    }

    #[test]
    fn test_read_only_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let fs_impl = LocalFileSystem::new();
        let file = temp_dir.path().join("movie.nfo");
        std::fs::write(&file, b"<movie/>").unwrap();

        fs_impl.set_attributes(&file, false, true).unwrap();
        assert!(std::fs::metadata(&file).unwrap().permissions().readonly());

        fs_impl.set_attributes(&file, false, false).unwrap();
        assert!(!std::fs::metadata(&file).unwrap().permissions().readonly());
    }

    #[test]
    fn test_catalog_discovers_files_and_discs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        std::fs::create_dir_all(root.join("Heat")).unwrap();
        std::fs::write(root.join("Heat").join("Heat.mkv"), b"v").unwrap();
        std::fs::write(root.join("Heat").join("Heat.nfo"), b"<movie/>").unwrap();

        std::fs::create_dir_all(root.join("Shorts")).unwrap();
        std::fs::write(root.join("Shorts").join("one.mp4"), b"v").unwrap();
        std::fs::write(root.join("Shorts").join("two.mkv"), b"v").unwrap();

        std::fs::create_dir_all(root.join("Alien").join("VIDEO_TS")).unwrap();
        std::fs::write(root.join("Alien").join("VIDEO_TS").join("VTS_01_1.VOB"), b"v").unwrap();

        let catalog = WalkdirCatalog::new(vec![root.to_path_buf()], root.join(".meta"), extensions());
        let items = catalog.items(&ItemQuery::movies()).unwrap();
        assert_eq!(items.len(), 4);

        let alien = items.iter().find(|i| i.name == "Alien").unwrap();
        assert_eq!(alien.video_type, VideoType::Dvd);

        let heat = items.iter().find(|i| i.name == "Heat").unwrap();
        assert!(!heat.is_in_mixed_folder);

        let one = items.iter().find(|i| i.name == "one").unwrap();
        assert!(one.is_in_mixed_folder);
    }

    #[tokio::test]
    async fn test_skeleton_writer_creates_nfo_once() {
        let temp_dir = TempDir::new().unwrap();
        let video = temp_dir.path().join("Heat & Dust.mkv");
        std::fs::write(&video, b"v").unwrap();
        let item = VideoItem::new(video, &temp_dir.path().join("meta"));

        SkeletonNfoWriter.save_base_metadata(&item).await.unwrap();
        let nfo = temp_dir.path().join("Heat & Dust.nfo");
        let content = std::fs::read_to_string(&nfo).unwrap();
        assert!(content.contains("<title>Heat &amp; Dust</title>"));

        std::fs::write(&nfo, "<movie><title>edited</title></movie>").unwrap();
        SkeletonNfoWriter.save_base_metadata(&item).await.unwrap();
        assert!(std::fs::read_to_string(&nfo).unwrap().contains("edited"));
    }
}
