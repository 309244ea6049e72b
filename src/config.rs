use crate::error::{ChapterSyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for NFO chapter sync
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Chapter image sync behaviour
    pub sync: ChapterSyncConfig,

    /// NFO saving options
    pub metadata: MetadataConfig,

    /// Library locations and tools
    pub library: LibraryConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

/// Chapter image handling shared by the scan and extraction tasks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChapterSyncConfig {
    /// Extract chapter images to the paths named in the NFO files
    pub extract_to_paths: bool,

    /// Replace existing chapter images when extracting
    pub force_replace: bool,

    /// Leave extraction to the scheduled task instead of running it after scans
    pub use_own_task: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetadataConfig {
    /// Mark saved NFO files hidden
    pub save_metadata_hidden: bool,

    /// Image path changes alone are enough to rewrite NFO files
    pub save_image_paths_in_nfo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LibraryConfig {
    /// Library root folders
    pub roots: Vec<PathBuf>,

    /// Root of the per-item internal metadata folders
    pub metadata_dir: PathBuf,

    /// Directory of the persisted chapter store
    pub chapter_store_dir: PathBuf,

    /// Supported video file extensions
    pub supported_extensions: Vec<String>,

    /// ffmpeg executable used for frame extraction
    pub ffmpeg_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Log level
    pub log_level: String,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from the first config file found, else from the environment
    pub fn load() -> Result<Self> {
        let mut config_paths = vec![
            PathBuf::from("nfo-chapters.toml"),
            PathBuf::from("config/nfo-chapters.toml"),
        ];
        if let Some(config_home) = user_config_dir() {
            config_paths.push(config_home.join("nfo-chapters").join("config.toml"));
        }
        config_paths.push(PathBuf::from("/etc/nfo-chapters/config.toml"));

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            ChapterSyncError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = toml::from_str(&config_str).map_err(|e| {
            ChapterSyncError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `NFO_CHAPTERS_*` variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("NFO_CHAPTERS_EXTRACT_TO_PATHS") {
            self.sync.extract_to_paths = value.parse().unwrap_or(self.sync.extract_to_paths);
        }

        if let Some(value) = lookup("NFO_CHAPTERS_FORCE_REPLACE") {
            self.sync.force_replace = value.parse().unwrap_or(self.sync.force_replace);
        }

        if let Some(value) = lookup("NFO_CHAPTERS_USE_OWN_TASK") {
            self.sync.use_own_task = value.parse().unwrap_or(self.sync.use_own_task);
        }

        if let Some(value) = lookup("NFO_CHAPTERS_SAVE_HIDDEN") {
            self.metadata.save_metadata_hidden = value.parse().unwrap_or(self.metadata.save_metadata_hidden);
        }

        if let Some(roots) = lookup("NFO_CHAPTERS_LIBRARY") {
            self.library.roots = std::env::split_paths(&roots).collect();
        }

        if let Some(dir) = lookup("NFO_CHAPTERS_METADATA_DIR") {
            self.library.metadata_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("NFO_CHAPTERS_STORE_DIR") {
            self.library.chapter_store_dir = PathBuf::from(dir);
        }

        if let Some(ffmpeg) = lookup("NFO_CHAPTERS_FFMPEG") {
            self.library.ffmpeg_path = PathBuf::from(ffmpeg);
        }

        if let Some(log_level) = lookup("NFO_CHAPTERS_LOG_LEVEL") {
            self.output.log_level = log_level;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| ChapterSyncError::Config(format!("cannot serialize configuration: {}", e)))?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.library.roots.is_empty() {
            return Err(ChapterSyncError::Config("no library roots configured".to_string()));
        }

        if let Some(missing) = self.library.roots.iter().find(|root| !root.is_dir()) {
            return Err(ChapterSyncError::Config(format!(
                "library root is not a directory: {}",
                missing.display()
            )));
        }

        if self.library.supported_extensions.is_empty() {
            return Err(ChapterSyncError::Config("supported_extensions must not be empty".to_string()));
        }

        if self.library.ffmpeg_path.as_os_str().is_empty() {
            return Err(ChapterSyncError::Config("ffmpeg_path must not be empty".to_string()));
        }

        if !LOG_LEVELS.contains(&self.output.log_level.as_str()) {
            return Err(ChapterSyncError::Config(format!(
                "unknown log level '{}'",
                self.output.log_level
            )));
        }

        if self.sync.force_replace && !self.sync.extract_to_paths {
            tracing::warn!("force_replace has no effect while extract_to_paths is disabled");
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        let roots: Vec<String> = self
            .library
            .roots
            .iter()
            .map(|r| r.display().to_string())
            .collect();

        format!(
            "NFO Chapters Configuration:\n\
            - Library Roots: {}\n\
            - Chapter Store: {}\n\
            - Metadata Directory: {}\n\
            - Extract To NFO Paths: {}\n\
            - Force Replace: {}\n\
            - Own Extraction Task: {}\n\
            - Save NFO Hidden: {}\n\
            - Supported Extensions: {}",
            roots.join(", "),
            self.library.chapter_store_dir.display(),
            self.library.metadata_dir.display(),
            self.sync.extract_to_paths,
            self.sync.force_replace,
            self.sync.use_own_task,
            self.metadata.save_metadata_hidden,
            self.library.supported_extensions.join(", ")
        )
    }
}

fn user_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

impl Default for ChapterSyncConfig {
    fn default() -> Self {
        Self {
            extract_to_paths: false,
            force_replace: false,
            use_own_task: false,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            save_metadata_hidden: false,
            save_image_paths_in_nfo: true,
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            metadata_dir: PathBuf::from("./data/metadata"),
            chapter_store_dir: PathBuf::from("./data/chapters"),
            supported_extensions: vec![
                "mkv".to_string(),
                "mp4".to_string(),
                "m4v".to_string(),
                "avi".to_string(),
                "mov".to_string(),
                "webm".to_string(),
                "ts".to_string(),
                "iso".to_string(),
            ],
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync: ChapterSyncConfig::default(),
            metadata: MetadataConfig::default(),
            library: LibraryConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_library_root(mut self, root: PathBuf) -> Self {
        self.config.library.roots.push(root);
        self
    }

    pub fn with_metadata_dir(mut self, dir: PathBuf) -> Self {
        self.config.library.metadata_dir = dir;
        self
    }

    pub fn with_chapter_store_dir(mut self, dir: PathBuf) -> Self {
        self.config.library.chapter_store_dir = dir;
        self
    }

    pub fn with_ffmpeg_path(mut self, path: PathBuf) -> Self {
        self.config.library.ffmpeg_path = path;
        self
    }

    pub fn extract_to_paths(mut self, enable: bool) -> Self {
        self.config.sync.extract_to_paths = enable;
        self
    }

    pub fn force_replace(mut self, enable: bool) -> Self {
        self.config.sync.force_replace = enable;
        self
    }

    pub fn use_own_task(mut self, enable: bool) -> Self {
        self.config.sync.use_own_task = enable;
        self
    }

    pub fn save_metadata_hidden(mut self, enable: bool) -> Self {
        self.config.metadata.save_metadata_hidden = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
