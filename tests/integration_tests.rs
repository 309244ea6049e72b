use async_trait::async_trait;
use nfo_chapters::library::paths::{chapter_image_path, chapter_images_path};
use nfo_chapters::library::{JsonChapterStore, LocalFileSystem, SkeletonNfoWriter, WalkdirCatalog};
use nfo_chapters::{
    ChapterNfoSaver, ChapterRecord, ChapterStore, ChapterSyncConfig, ExtractImagesTask, ExtractionEngine, ItemQuery,
    Catalog, MetadataConfig, NfoChapterParser, PostScanTask, Result, SaveOutcome, VideoItem,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// Engine that "extracts" a text frame per chapter into the internal folder
struct FrameWriter;

#[async_trait]
impl ExtractionEngine for FrameWriter {
    async fn refresh_chapter_images(
        &self,
        item: &VideoItem,
        chapters: &mut [ChapterRecord],
        extract_images: bool,
        _save_chapters: bool,
        _cancel: &CancellationToken,
    ) -> Result<bool> {
        if !extract_images {
            return Ok(true);
        }

        for chapter in chapters.iter_mut() {
            let path = chapter_image_path(item, chapter.start_ticks);
            fs::create_dir_all(path.parent().unwrap()).await?;
            fs::write(&path, format!("frame at {}", chapter.start_ticks)).await?;
            chapter.image_path = Some(path.to_string_lossy().into_owned());
        }

        Ok(true)
    }
}

struct Library {
    temp_dir: TempDir,
    catalog: Arc<WalkdirCatalog>,
    store: Arc<JsonChapterStore>,
    fs: Arc<LocalFileSystem>,
}

impl Library {
    async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("movies");
        fs::create_dir_all(&root).await.unwrap();

        let store = JsonChapterStore::new(temp_dir.path().join("store"));
        store.initialize().await.unwrap();

        Self {
            catalog: Arc::new(WalkdirCatalog::new(
                vec![root],
                temp_dir.path().join("meta"),
                vec!["mkv".to_string()],
            )),
            store: Arc::new(store),
            fs: Arc::new(LocalFileSystem::new()),
            temp_dir,
        }
    }

    fn root(&self) -> PathBuf {
        self.temp_dir.path().join("movies")
    }

    async fn add_movie(&self, name: &str, nfo: Option<&str>) -> PathBuf {
        let folder = self.root().join(name);
        fs::create_dir_all(&folder).await.unwrap();
        let video = folder.join(format!("{}.mkv", name));
        fs::write(&video, b"mock video").await.unwrap();
        if let Some(nfo) = nfo {
            fs::write(folder.join(format!("{}.nfo", name)), nfo).await.unwrap();
        }
        video
    }

    fn item(&self, video: &Path) -> VideoItem {
        self.catalog
            .items(&ItemQuery::movies())
            .unwrap()
            .into_iter()
            .find(|item| item.path == video)
            .unwrap()
    }

    fn post_scan(&self, config: ChapterSyncConfig) -> PostScanTask {
        PostScanTask::new(
            self.catalog.clone(),
            self.store.clone(),
            self.fs.clone(),
            Arc::new(FrameWriter),
            config,
        )
    }

    fn saver(&self) -> ChapterNfoSaver {
        ChapterNfoSaver::new(
            self.store.clone(),
            self.fs.clone(),
            Arc::new(SkeletonNfoWriter),
            MetadataConfig::default(),
        )
    }
}

fn heat_nfo(images: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>
<movie>
  <title>Heat</title>
  <chapters>
    <chapter name="Opening" start="0">{}</chapter>
    <chapter name="The Heist" start="3725">{}</chapter>
  </chapters>
  <year>1995</year>
</movie>
https://www.themoviedb.org/movie/949"#,
        images.join("opening.jpg").display(),
        images.join("heist.jpg").display()
    )
}

#[tokio::test]
async fn test_scan_imports_chapters_and_extracts_to_nfo_paths() {
    let library = Library::new().await;
    let images = library.root().join("Heat").join("images");
    let video = library.add_movie("Heat", Some(&heat_nfo(&images))).await;
    library.add_movie("Ronin", None).await;

    let config = ChapterSyncConfig {
        extract_to_paths: true,
        force_replace: false,
        use_own_task: false,
    };
    let summary = library
        .post_scan(config)
        .run(&|_: f64| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let heat = library.item(&video);
    let stored = library.store.get(&heat.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].name, "Opening");
    assert_eq!(stored[1].start_ticks, 37_250_000_000);

    // Extracted frames were copied to the NFO paths, which the chapters keep
    let opening = images.join("opening.jpg");
    assert_eq!(stored[0].image_path.as_deref(), Some(opening.to_string_lossy().as_ref()));
    assert!(stored[0].image_last_modified.is_some());
    assert_eq!(std::fs::read_to_string(&opening).unwrap(), "frame at 0");
    assert_eq!(
        std::fs::read_to_string(images.join("heist.jpg")).unwrap(),
        "frame at 37250000000"
    );
}

#[tokio::test]
async fn test_save_merges_back_into_sidecar() {
    let library = Library::new().await;
    let images = library.root().join("Heat").join("images");
    let video = library.add_movie("Heat", Some(&heat_nfo(&images))).await;

    library
        .post_scan(ChapterSyncConfig::default())
        .run(&|_: f64| {}, &CancellationToken::new())
        .await
        .unwrap();

    let heat = library.item(&video);
    let saver = library.saver();
    let cancel = CancellationToken::new();

    // Store and sidecar agree: nothing to write
    assert_eq!(
        saver.save(&heat, &cancel).await.unwrap(),
        SaveOutcome::Saved {
            sidecar_rewritten: false,
            store_updated: false
        }
    );

    let mut chapters = library.store.get(&heat.id).await.unwrap();
    chapters.push(ChapterRecord::new("Credits", 9_000 * 10_000_000));
    library.store.save(&heat.id, &chapters).await.unwrap();

    assert_eq!(
        saver.save(&heat, &cancel).await.unwrap(),
        SaveOutcome::Saved {
            sidecar_rewritten: true,
            store_updated: false
        }
    );

    let nfo_path = saver.save_path(&heat);
    let xml = std::fs::read_to_string(&nfo_path).unwrap();
    assert!(xml.contains("<year>1995</year>"));
    assert!(xml.contains("<chapter name=\"Credits\" start=\"9000\"></chapter>"));
    assert!(!xml.contains("themoviedb"));

    let parser = NfoChapterParser::new(library.fs.clone());
    let sidecar = parser.parse_file(&nfo_path, &cancel).await.unwrap().unwrap();
    let names: Vec<&str> = sidecar.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Opening", "The Heist", "Credits"]);
}

#[tokio::test]
async fn test_save_creates_missing_sidecar() {
    let library = Library::new().await;
    let video = library.add_movie("Ronin", None).await;
    let ronin = library.item(&video);

    library
        .store
        .save(
            &ronin.id,
            &[
                ChapterRecord::new("Paris", 0),
                ChapterRecord::new("Nice", 2_345 * 10_000_000),
            ],
        )
        .await
        .unwrap();

    let saver = library.saver();
    let outcome = saver.save(&ronin, &CancellationToken::new()).await.unwrap();
    assert_eq!(
        outcome,
        SaveOutcome::Saved {
            sidecar_rewritten: true,
            store_updated: false
        }
    );

    let xml = std::fs::read_to_string(saver.save_path(&ronin)).unwrap();
    assert!(xml.contains("<title>Ronin</title>"));
    assert!(xml.contains("<chapter name=\"Nice\" start=\"2345\"></chapter>"));
}

#[tokio::test]
async fn test_extract_task_force_replaces_internal_images() {
    let library = Library::new().await;
    let images = library.root().join("Heat").join("images");
    let video = library.add_movie("Heat", Some(&heat_nfo(&images))).await;

    library
        .post_scan(ChapterSyncConfig::default())
        .run(&|_: f64| {}, &CancellationToken::new())
        .await
        .unwrap();

    let heat = library.item(&video);
    let stale = chapter_images_path(&heat).join("12345.jpg");
    fs::create_dir_all(stale.parent().unwrap()).await.unwrap();
    fs::write(&stale, b"stale").await.unwrap();

    let disabled = ExtractImagesTask::new(
        library.catalog.clone(),
        library.store.clone(),
        library.fs.clone(),
        Arc::new(FrameWriter),
        ChapterSyncConfig::default(),
    );
    let summary = disabled.run(&|_: f64| {}, &CancellationToken::new()).await.unwrap();
    assert_eq!(summary.total, 0);
    assert!(stale.exists());

    let task = ExtractImagesTask::new(
        library.catalog.clone(),
        library.store.clone(),
        library.fs.clone(),
        Arc::new(FrameWriter),
        ChapterSyncConfig {
            extract_to_paths: true,
            force_replace: true,
            use_own_task: true,
        },
    );
    let summary = task.run(&|_: f64| {}, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.failed, 0);
    assert!(!stale.exists());
    assert_eq!(
        std::fs::read_to_string(images.join("opening.jpg")).unwrap(),
        "frame at 0"
    );
}

#[tokio::test]
async fn test_cancelled_scan_stops() {
    let library = Library::new().await;
    let images = library.root().join("Heat").join("images");
    library.add_movie("Heat", Some(&heat_nfo(&images))).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = library
        .post_scan(ChapterSyncConfig::default())
        .run(&|_: f64| {}, &cancel)
        .await;

    assert!(matches!(result, Err(nfo_chapters::ChapterSyncError::Cancelled)));
}
