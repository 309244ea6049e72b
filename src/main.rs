use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use nfo_chapters::library::{FfmpegExtractionEngine, JsonChapterStore, LocalFileSystem, SkeletonNfoWriter, WalkdirCatalog};
use nfo_chapters::{
    Catalog, ChapterNfoSaver, ChapterSyncError, Config, ExtractImagesTask, ItemQuery, NfoChapterParser, PostScanTask,
    SaveOutcome, TaskSummary, VideoItem,
};

fn cli() -> Command {
    Command::new("nfo-chapters")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Sync chapter markers between NFO sidecars, the chapter store and chapter thumbnails")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (defaults to the standard locations)")
                .global(true),
        )
        .arg(
            Arg::new("library")
                .short('l')
                .long("library")
                .value_name("DIR")
                .help("Library folder (repeatable, replaces configured roots)")
                .action(ArgAction::Append)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("scan").about("Import NFO chapters into the chapter store"))
        .subcommand(
            Command::new("extract-images")
                .about("Extract chapter images to the paths named in NFO files")
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help("Replace existing chapter images")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("save")
                .about("Write persisted chapters into NFO files")
                .arg(
                    Arg::new("all")
                        .short('a')
                        .long("all")
                        .help("Save every movie in the library")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("media"),
                )
                .arg(
                    Arg::new("media")
                        .value_name("PATH")
                        .help("Media file or disc folder to save")
                        .required_unless_present("all"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print the chapters of an NFO file as JSON")
                .arg(Arg::new("nfo").value_name("NFO").required(true)),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };

    if let Some(roots) = matches.get_many::<String>("library") {
        config.library.roots = roots.map(PathBuf::from).collect();
    }

    let level = if verbose { "debug" } else { config.output.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nfo_chapters={},warn", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if verbose {
        info!("Verbose logging enabled");
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupted, stopping after the current item");
            ctrl_c.cancel();
        }
    });

    let result = match matches.subcommand() {
        Some(("show", sub)) => show(sub, &cancel).await,
        Some((name, sub)) => {
            config.validate()?;
            debug!("{}", config.summary());
            run_command(name, sub, config, &cancel).await
        }
        None => Err(anyhow!("no command given")),
    };

    match result {
        Err(e) if matches!(e.downcast_ref::<ChapterSyncError>(), Some(ChapterSyncError::Cancelled)) => {
            warn!("Cancelled");
            Ok(())
        }
        other => other,
    }
}

async fn show(matches: &ArgMatches, cancel: &CancellationToken) -> Result<()> {
    let path = matches
        .get_one::<String>("nfo")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("NFO path is required"))?;

    let parser = NfoChapterParser::new(Arc::new(LocalFileSystem::new()));
    let chapters = parser
        .parse_file(&path, cancel)
        .await?
        .ok_or_else(|| anyhow!("NFO file not found: {}", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&chapters)?);
    Ok(())
}

async fn run_command(name: &str, matches: &ArgMatches, mut config: Config, cancel: &CancellationToken) -> Result<()> {
    let fs = Arc::new(LocalFileSystem::new());
    let store = Arc::new(JsonChapterStore::new(config.library.chapter_store_dir.clone()));
    store.initialize().await?;

    let catalog = Arc::new(WalkdirCatalog::new(
        config.library.roots.clone(),
        config.library.metadata_dir.clone(),
        config.library.supported_extensions.clone(),
    ));
    let engine = Arc::new(FfmpegExtractionEngine::new(
        config.library.ffmpeg_path.clone(),
        fs.clone(),
        store.clone(),
    ));
    let progress = |percent: f64| debug!("Progress: {:.1}%", percent);

    let start_time = std::time::Instant::now();

    match name {
        "scan" => {
            let task = PostScanTask::new(catalog, store, fs, engine, config.sync);
            let summary = task.run(&progress, cancel).await?;
            report(&summary, start_time);
        }
        "extract-images" => {
            if matches.get_flag("force") {
                config.sync.force_replace = true;
            }
            let task = ExtractImagesTask::new(catalog, store, fs, engine, config.sync);
            let summary = task.run(&progress, cancel).await?;
            report(&summary, start_time);
        }
        "save" => {
            let saver = ChapterNfoSaver::new(store, fs, Arc::new(SkeletonNfoWriter), config.metadata);
            let items = if matches.get_flag("all") {
                catalog.items(&ItemQuery::movies())?
            } else {
                let media = matches
                    .get_one::<String>("media")
                    .map(PathBuf::from)
                    .ok_or_else(|| anyhow!("media path is required"))?;
                vec![resolve_item(&*catalog, &media, &config.library.metadata_dir)?]
            };
            save_items(&saver, &items, cancel).await?;
        }
        other => return Err(anyhow!("unknown command: {}", other)),
    }

    Ok(())
}

/// Find a media path in the library, or describe it as a standalone movie
fn resolve_item(catalog: &dyn Catalog, media: &Path, metadata_dir: &Path) -> Result<VideoItem> {
    let media = media
        .canonicalize()
        .with_context(|| format!("cannot access {}", media.display()))?;

    let query = ItemQuery {
        recursive: true,
        ..ItemQuery::default()
    };
    let items = match catalog.items(&query) {
        Ok(items) => items,
        Err(e) => {
            warn!("Could not list the library, treating {} as standalone: {}", media.display(), e);
            Vec::new()
        }
    };
    let found = items
        .into_iter()
        .find(|item| item.path.canonicalize().map_or(false, |p| p == media));

    Ok(found.unwrap_or_else(|| {
        debug!("{} is not part of the library, saving it standalone", media.display());
        VideoItem::new(media, metadata_dir)
    }))
}

async fn save_items(saver: &ChapterNfoSaver, items: &[VideoItem], cancel: &CancellationToken) -> Result<()> {
    let mut summary = TaskSummary {
        total: items.len(),
        ..TaskSummary::default()
    };

    for item in items {
        if cancel.is_cancelled() {
            return Err(ChapterSyncError::Cancelled.into());
        }

        match saver.save(item, cancel).await {
            Ok(SaveOutcome::Skipped) => summary.skipped += 1,
            Ok(SaveOutcome::MissingSidecar(_)) => summary.failed += 1,
            Ok(SaveOutcome::Saved {
                sidecar_rewritten,
                store_updated,
            }) => {
                if sidecar_rewritten || store_updated {
                    summary.updated += 1;
                } else {
                    summary.unchanged += 1;
                }
            }
            Err(ChapterSyncError::Cancelled) => return Err(ChapterSyncError::Cancelled.into()),
            Err(e) => {
                error!("❌ Failed to save NFO chapters for {}: {}", item.name, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "✅ Saved NFO chapters: {} updated, {} unchanged, {} skipped, {} failed",
        summary.updated, summary.unchanged, summary.skipped, summary.failed
    );
    Ok(())
}

fn report(summary: &TaskSummary, start_time: std::time::Instant) {
    info!("🎉 Completed in {:.2}s", start_time.elapsed().as_secs_f64());
    info!("📊 Items: {}", summary.total);
    info!("✅ Updated: {}", summary.updated);
    info!("➖ Unchanged: {}", summary.unchanged);
    info!("⏭️ Skipped: {}", summary.skipped);
    info!("❌ Failed: {}", summary.failed);
}
