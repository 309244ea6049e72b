//! NFO chapter writer
//!
//! Rewrites the `<chapters>` element of an NFO document in place. The document
//! is never re-serialized: element byte ranges are located with roxmltree and
//! only the chapter block is spliced, so every other byte of the sidecar
//! (comments, ordering, unknown tags, formatting) survives a save.

use super::parser::{element_text, parse_document, parse_start, strip_bom, truncate_after_last_closing_tag};
use super::{ticks_to_seconds, ChapterRecord};
use crate::error::{ChapterSyncError, Result};
use std::ops::Range;

const INDENT: &str = "  ";

/// An NFO sidecar held as text for chapter edits
#[derive(Debug, Clone, PartialEq)]
pub struct NfoDocument {
    text: String,
}

impl NfoDocument {
    /// Load sidecar text. Noise after the last closing tag is dropped.
    pub fn parse(xml: &str) -> Result<Self> {
        let xml = strip_bom(xml);
        let xml = truncate_after_last_closing_tag(xml).unwrap_or(xml);

        parse_document(xml)?;

        Ok(Self {
            text: xml.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Chapters as written in the sidecar, for the save direction.
    ///
    /// Stricter than [`super::NfoChapterParser`]: elements without a name or
    /// without a parseable `start` are skipped, and image timestamps are not
    /// resolved.
    pub fn sidecar_chapters(&self) -> Result<Vec<ChapterRecord>> {
        let doc = parse_document(&self.text)?;
        let mut chapters = Vec::new();

        for node in doc
            .root_element()
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "chapters")
        {
            let parsed: Vec<ChapterRecord> = node
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "chapter")
                .filter_map(|n| {
                    let name = n.attribute("name").map(str::trim).filter(|s| !s.is_empty())?;
                    let start_ticks = parse_start(n.attribute("start"))?;
                    let mut chapter = ChapterRecord::new(name, start_ticks);
                    let image = element_text(&n);
                    let image = image.trim();
                    if !image.is_empty() {
                        chapter.image_path = Some(image.to_string());
                    }
                    Some(chapter)
                })
                .collect();

            if !parsed.is_empty() {
                chapters = parsed;
            }
        }

        Ok(chapters)
    }

    /// Replace the chapter block with `chapters`, creating it as the last
    /// child of the root element when missing.
    pub fn set_chapters(&mut self, chapters: &[ChapterRecord]) -> Result<()> {
        let (range, replacement) = self.plan_chapter_edit(chapters)?;
        self.text.replace_range(range, &replacement);
        Ok(())
    }

    fn plan_chapter_edit(&self, chapters: &[ChapterRecord]) -> Result<(Range<usize>, String)> {
        let text = self.text.as_str();
        let doc = parse_document(text)?;
        let root = doc.root_element();

        let existing = root
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "chapters")
            .last();

        if let Some(node) = existing {
            let range = node.range();
            let indent = line_indent(text, range.start);
            let body = chapter_block_body(chapters, indent);
            let element = &text[range.clone()];

            if element.ends_with("/>") && !node.has_children() {
                let start_tag = element[..element.len() - 2].trim_end();
                return Ok((range, format!("{}>{}</chapters>", start_tag, body)));
            }

            let content_start = start_tag_end(text, range.start).ok_or_else(|| {
                ChapterSyncError::MalformedDocument("unterminated chapters start tag".to_string())
            })?;
            let content_end = element
                .rfind("</")
                .map(|i| range.start + i)
                .ok_or_else(|| ChapterSyncError::MalformedDocument("chapters end tag not found".to_string()))?;

            return Ok((content_start..content_end, body));
        }

        let range = root.range();
        let root_indent = line_indent(text, range.start);
        let child_indent = format!("{}{}", root_indent, INDENT);
        let block = format!(
            "{}<chapters>{}</chapters>\n",
            child_indent,
            chapter_block_body(chapters, &child_indent)
        );
        let element = &text[range.clone()];

        if element.ends_with("/>") && !root.has_children() {
            let start_tag = element[..element.len() - 2].trim_end();
            let name = tag_name(start_tag);
            return Ok((
                range,
                format!("{}>\n{}{}</{}>", start_tag, block, root_indent, name),
            ));
        }

        let close_start = element
            .rfind("</")
            .map(|i| range.start + i)
            .ok_or_else(|| ChapterSyncError::MalformedDocument("root end tag not found".to_string()))?;
        let line_start = text[..close_start].rfind('\n').map_or(0, |i| i + 1);

        if line_start > range.start && text[line_start..close_start].chars().all(char::is_whitespace) {
            Ok((line_start..line_start, block))
        } else {
            Ok((close_start..close_start, format!("\n{}", block)))
        }
    }
}

/// Content placed between `<chapters>` and `</chapters>`
fn chapter_block_body(chapters: &[ChapterRecord], indent: &str) -> String {
    if chapters.is_empty() {
        return String::new();
    }

    let mut body = String::from("\n");
    for chapter in chapters {
        body.push_str(&format!(
            "{}{}<chapter name=\"{}\" start=\"{}\">{}</chapter>\n",
            indent,
            INDENT,
            escape_xml(&chapter.name),
            ticks_to_seconds(chapter.start_ticks),
            escape_xml(chapter.image().unwrap_or_default())
        ));
    }
    body.push_str(indent);
    body
}

/// Whitespace preceding `pos` on its line, or "" when other content precedes it
fn line_indent(text: &str, pos: usize) -> &str {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &text[line_start..pos];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix
    } else {
        ""
    }
}

/// Byte offset just past the `>` closing the start tag that begins at `from`
fn start_tag_end(text: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in text[from..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '>') => return Some(from + i + 1),
            _ => {}
        }
    }
    None
}

/// Qualified element name of a start tag such as `<movie xmlns:x="...">`
fn tag_name(start_tag: &str) -> &str {
    let rest = start_tag.trim_start_matches('<');
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Escape text for use in XML content and attribute values
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
