//! Sidecar and thumbnail locations for a video item

use super::{FileSystem, VideoItem, VideoType};
use std::path::{Path, PathBuf};

/// Name of the item-private folder that holds extracted chapter thumbnails
pub const CHAPTER_IMAGES_DIR: &str = "chapters";

/// Candidate NFO paths for an item, in probing order
pub fn sidecar_candidates(item: &VideoItem) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let folder = &item.containing_folder_path;

    if item.video_type == VideoType::Dvd && !item.is_placeholder {
        candidates.push(folder.join("VIDEO_TS").join("VIDEO_TS.nfo"));
    }

    if !item.is_placeholder && matches!(item.video_type, VideoType::Dvd | VideoType::BluRay) {
        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        candidates.push(folder.join(format!("{}.nfo", folder_name)));
    } else {
        candidates.push(item.path.with_extension("nfo"));

        if !item.is_in_mixed_folder {
            candidates.push(folder.join("movie.nfo"));
        }
    }

    candidates
}

/// First existing sidecar for an item
pub fn find_sidecar(item: &VideoItem, fs: &dyn FileSystem) -> Option<PathBuf> {
    sidecar_candidates(item)
        .into_iter()
        .find(|candidate| fs.file_exists(candidate))
}

/// Path the NFO saver writes to
pub fn sidecar_save_path(item: &VideoItem) -> PathBuf {
    sidecar_candidates(item)
        .into_iter()
        .next()
        .unwrap_or_else(|| item.path.with_extension("nfo"))
}

/// Item-private chapter thumbnail folder
pub fn chapter_images_path(item: &VideoItem) -> PathBuf {
    item.internal_metadata_path.join(CHAPTER_IMAGES_DIR)
}

/// Internal thumbnail path for a chapter starting at `start_ticks`
pub fn chapter_image_path(item: &VideoItem, start_ticks: i64) -> PathBuf {
    chapter_images_path(item).join(format!("{}.jpg", start_ticks))
}

/// Whether `path` sits below the item's internal thumbnail folder
pub fn is_internal_chapter_image(item: &VideoItem, path: &Path) -> bool {
    path.starts_with(chapter_images_path(item))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> &'static Path {
        Path::new("/var/lib/meta")
    }

    #[test]
    fn test_plain_file_candidates() {
        let item = VideoItem::new(PathBuf::from("/movies/Heat/Heat.mkv"), meta());
        assert_eq!(
            sidecar_candidates(&item),
            vec![
                PathBuf::from("/movies/Heat/Heat.nfo"),
                PathBuf::from("/movies/Heat/movie.nfo"),
            ]
        );
    }

    #[test]
    fn test_mixed_folder_skips_movie_nfo() {
        let item = VideoItem::new(PathBuf::from("/movies/Heat.mkv"), meta()).with_mixed_folder(true);
        assert_eq!(sidecar_candidates(&item), vec![PathBuf::from("/movies/Heat.nfo")]);
    }

    #[test]
    fn test_disc_candidates() {
        let dvd = VideoItem::new(PathBuf::from("/movies/Alien"), meta()).with_disc_layout(VideoType::Dvd);
        assert_eq!(
            sidecar_candidates(&dvd),
            vec![
                PathBuf::from("/movies/Alien/VIDEO_TS/VIDEO_TS.nfo"),
                PathBuf::from("/movies/Alien/Alien.nfo"),
            ]
        );

        let bluray = VideoItem::new(PathBuf::from("/movies/Dune"), meta()).with_disc_layout(VideoType::BluRay);
        assert_eq!(sidecar_candidates(&bluray), vec![PathBuf::from("/movies/Dune/Dune.nfo")]);
        assert_eq!(sidecar_save_path(&bluray), PathBuf::from("/movies/Dune/Dune.nfo"));
    }

    #[test]
    fn test_chapter_image_paths() {
        let item = VideoItem::new(PathBuf::from("/movies/Heat/Heat.mkv"), meta());
        let image = chapter_image_path(&item, 600_000_000);
        assert!(image.ends_with("chapters/600000000.jpg"));
        assert!(is_internal_chapter_image(&item, &image));
        assert!(!is_internal_chapter_image(&item, Path::new("/movies/Heat/chapter1.jpg")));
    }
}
