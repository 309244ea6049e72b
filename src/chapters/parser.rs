//! NFO chapter parser
//!
//! Reads the `<chapters>` subtree of an NFO sidecar. Real-world sidecars often
//! carry junk after the closing root tag (URLs pasted by scrapers, editor
//! leftovers), so the text is cut after the last closing tag before parsing.
//!
//! ```xml
//! <movie>
//!   <title>Heat</title>
//!   <chapters>
//!     <chapter name="Opening" start="0">/movies/Heat/chapter-1.jpg</chapter>
//!     <chapter name="The Heist" start="1234.5"></chapter>
//!   </chapters>
//! </movie>
//! ```

use super::{seconds_to_ticks, ChapterRecord};
use crate::error::{ChapterSyncError, Result};
use crate::library::FileSystem;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cut `xml` right after the last closing tag, dropping trailing noise.
///
/// Returns `None` when the text has no closing tag at all.
pub fn truncate_after_last_closing_tag(xml: &str) -> Option<&str> {
    let tag_start = xml.rfind("</")?;
    let tag_end = xml[tag_start..].find('>')? + tag_start;
    Some(&xml[..=tag_end])
}

/// Strip a leading byte order mark
pub(crate) fn strip_bom(xml: &str) -> &str {
    xml.strip_prefix('\u{feff}').unwrap_or(xml)
}

/// Parse XML with the options every sidecar read uses
pub(crate) fn parse_document(xml: &str) -> Result<roxmltree::Document<'_>> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    roxmltree::Document::parse_with_options(xml, options)
        .map_err(|e| ChapterSyncError::MalformedDocument(format!("XML parse error: {}", e)))
}

/// Concatenated text content of an element
pub(crate) fn element_text(node: &roxmltree::Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Parse a `start` attribute value (decimal seconds) into ticks
pub(crate) fn parse_start(value: Option<&str>) -> Option<i64> {
    let seconds: f64 = value?.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(seconds_to_ticks(seconds))
}

/// Parses chapter lists out of NFO sidecars
#[derive(Clone)]
pub struct NfoChapterParser {
    fs: Arc<dyn FileSystem>,
}

impl NfoChapterParser {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Read and parse a sidecar file.
    ///
    /// A missing file yields `Ok(None)`; unusable content yields
    /// [`ChapterSyncError::MalformedDocument`].
    pub async fn parse_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<ChapterRecord>>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No NFO at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let xml = String::from_utf8_lossy(&bytes);
        self.parse_str(&xml, cancel).map(Some)
    }

    /// Parse sidecar text into a chapter list (possibly empty)
    pub fn parse_str(&self, xml: &str, cancel: &CancellationToken) -> Result<Vec<ChapterRecord>> {
        let xml = truncate_after_last_closing_tag(strip_bom(xml))
            .ok_or_else(|| ChapterSyncError::MalformedDocument("no closing tag found".to_string()))?;

        let doc = parse_document(xml)?;
        let mut chapters = Vec::new();

        for node in doc.root_element().children().filter(|n| n.is_element()) {
            if cancel.is_cancelled() {
                return Err(ChapterSyncError::Cancelled);
            }

            if node.tag_name().name() != "chapters" {
                continue;
            }

            let parsed = self.read_chapters(&node);
            if !parsed.is_empty() {
                chapters = parsed;
            }
        }

        Ok(chapters)
    }

    fn read_chapters(&self, chapters_node: &roxmltree::Node) -> Vec<ChapterRecord> {
        let mut chapters = Vec::new();

        for node in chapters_node
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "chapter")
        {
            let name = match node.attribute("name").map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => {
                    warn!("Skipping NFO chapter without a name");
                    continue;
                }
            };

            let mut chapter = ChapterRecord::new(name, 0);

            if let Some(raw) = node.attribute("start") {
                match parse_start(Some(raw)) {
                    Some(ticks) => chapter.start_ticks = ticks,
                    None => warn!("Ignoring unusable start '{}' of chapter '{}'", raw, chapter.name),
                }
            }

            let image_path = element_text(&node);
            let image_path = image_path.trim();
            if !image_path.is_empty() {
                chapter.image_last_modified = self.fs.last_write_time_utc(Path::new(image_path));
                chapter.image_path = Some(image_path.to_string());
            }

            chapters.push(chapter);
        }

        chapters
    }
}
