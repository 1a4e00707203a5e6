//! DOCX template codec
//!
//! A .docx file is a ZIP archive of XML parts. This codec works on the raw
//! WordprocessingML instead of a DOCX object model:
//!
//! 1. Every ZIP entry is kept as-is
//! 2. `word/document.xml` and the header/footer parts referenced by each
//!    section are scanned for `<w:p>`, `<w:tbl>`, `<w:tr>`, `<w:tc>` and `<w:t>`
//!    elements to build a [`Document`] tree
//! 3. Each `<w:t>` becomes a [`Span`] whose [`SpanOrigin`] records the byte
//!    range of the element in its part
//! 4. On serialization only the `<w:t>` elements whose text changed are
//!    rewritten; run properties and all other XML stay byte-identical

use crate::codec::{CodecError, DocumentCodec};
use crate::document_model::{
    Block, Container, Document, Section, Span, SpanOrigin, Table, TableCell, TableRow,
};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use zip::read::ZipArchive;
use zip::write::SimpleFileOptions;
use zip::{DateTime, ZipWriter};

/// Main document part
const DOCUMENT_PART: &str = "word/document.xml";

/// Relationships of the main document part
const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";

const TEXT_CLOSE: &str = "</w:t>";

static ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)w:(p|tbl|tr|tc|t)(?:\s[^>]*?)?(/?)>").expect("element regex is valid")
});

static SECT_PR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:sectPr\b[^>]*?(?:/>|>.*?</w:sectPr>)").expect("sectPr regex is valid")
});

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:(header|footer)Reference\b([^>]*)>").expect("reference regex is valid")
});

static RELATIONSHIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<Relationship\b([^>]*)>").expect("relationship regex is valid")
});

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w:.-]+)\s*=\s*"([^"]*)""#).expect("attribute regex is valid")
});

/// Errors reading or writing DOCX files
#[derive(Error, Debug)]
pub enum DocxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Missing part {0}; not a WordprocessingML document")]
    MissingPart(String),

    #[error("Part {0} is not valid UTF-8")]
    Encoding(String),

    #[error("Malformed XML in {part}: {message}")]
    Structure { part: String, message: String },
}

fn structure(part: &str, message: impl Into<String>) -> DocxError {
    DocxError::Structure {
        part: part.to_string(),
        message: message.into(),
    }
}

/// One entry of the ZIP archive
struct ZipEntry {
    name: String,
    data: Vec<u8>,
    /// Timestamp carried over to every rendered copy
    modified: DateTime,
}

/// An XML part that contributes containers to the document
struct XmlPart {
    /// Index into the entry list
    entry: usize,
    xml: String,
}

/// A parsed DOCX template
pub struct DocxTemplate {
    entries: Vec<ZipEntry>,
    parts: Vec<XmlPart>,
    document: Document,
}

impl DocxTemplate {
    /// Read and parse a template from disk
    pub fn open(path: &Path) -> Result<Self, DocxError> {
        log::info!("Reading DOCX template from {}", path.display());
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse a template from its raw bytes
    ///
    /// # Returns
    /// * `Ok(DocxTemplate)` - Template with its container tree
    /// * `Err(DocxError)` - Not a ZIP, no main document part, or malformed XML
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        let entries = read_entries(bytes)?;
        let index: HashMap<&str, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.as_str(), i))
            .collect();

        let mut parts = Vec::new();

        let document_entry = *index
            .get(DOCUMENT_PART)
            .ok_or_else(|| DocxError::MissingPart(DOCUMENT_PART.to_string()))?;
        let document_xml = part_xml(&entries[document_entry])?;
        let body = parse_blocks(0, DOCUMENT_PART, &document_xml)?;

        let relationships = index
            .get(DOCUMENT_RELS)
            .map(|&i| part_xml(&entries[i]))
            .transpose()?
            .map(|xml| parse_relationships(&xml))
            .unwrap_or_default();

        let section_refs = section_references(&document_xml);
        parts.push(XmlPart {
            entry: document_entry,
            xml: document_xml,
        });

        let mut attached: HashSet<String> = HashSet::new();
        let mut sections = Vec::with_capacity(section_refs.len());
        for refs in section_refs {
            let mut section = Section::default();
            for (kind, rel_id) in refs {
                let Some(target) = relationships.get(&rel_id) else {
                    log::warn!("Section references unknown relationship {}", rel_id);
                    continue;
                };
                let part_name = resolve_target(target);
                // a part shared by several sections belongs to the first one
                if !attached.insert(part_name.clone()) {
                    continue;
                }
                let Some(&entry) = index.get(part_name.as_str()) else {
                    log::warn!("Section references missing part {}", part_name);
                    continue;
                };

                let xml = part_xml(&entries[entry])?;
                let blocks = parse_blocks(parts.len(), &part_name, &xml)?;
                parts.push(XmlPart { entry, xml });
                match kind {
                    ReferenceKind::Header => section.header = blocks,
                    ReferenceKind::Footer => section.footer = blocks,
                }
            }
            sections.push(section);
        }

        let document = Document { body, sections };
        log::info!(
            "Parsed template: {} parts, {} sections, {} text containers",
            parts.len(),
            document.sections.len(),
            document.container_count()
        );

        Ok(Self {
            entries,
            parts,
            document,
        })
    }

    /// Write a merged copy of the template as DOCX bytes
    pub fn render(&self, doc: &Document) -> Result<Vec<u8>, CodecError> {
        let mut edits: Vec<Vec<(Range<usize>, &str)>> = vec![Vec::new(); self.parts.len()];

        for container in doc.containers() {
            for span in &container.spans {
                let Some(origin) = &span.origin else {
                    continue;
                };
                let part = self.parts.get(origin.part).ok_or_else(|| {
                    CodecError::Mismatch(format!("span refers to unknown part {}", origin.part))
                })?;
                let original = element_text(&part.xml, &origin.range).ok_or_else(|| {
                    CodecError::Mismatch(format!(
                        "no <w:t> element at {:?} in {}",
                        origin.range, self.entries[part.entry].name
                    ))
                })?;
                if original != span.text {
                    edits[origin.part].push((origin.range.clone(), span.text.as_str()));
                }
            }
        }

        let mut replaced: HashMap<usize, String> = HashMap::new();
        for (part, part_edits) in self.parts.iter().zip(edits) {
            if !part_edits.is_empty() {
                replaced.insert(part.entry, apply_edits(&part.xml, part_edits));
            }
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for (i, entry) in self.entries.iter().enumerate() {
            // Images don't compress well
            let method = if entry.name.starts_with("word/media/") {
                zip::CompressionMethod::Stored
            } else {
                zip::CompressionMethod::Deflated
            };
            // identical inputs must give identical bytes, so never stamp the current time
            let options = SimpleFileOptions::default()
                .compression_method(method)
                .last_modified_time(entry.modified);
            writer
                .start_file(entry.name.as_str(), options)
                .map_err(DocxError::from)?;
            let data = replaced
                .get(&i)
                .map_or(entry.data.as_slice(), |xml| xml.as_bytes());
            writer.write_all(data).map_err(DocxError::from)?;
        }

        let cursor = writer.finish().map_err(DocxError::from)?;
        Ok(cursor.into_inner())
    }
}

impl DocumentCodec for DocxTemplate {
    fn template(&self) -> &Document {
        &self.document
    }

    fn serialize(&self, doc: &Document) -> Result<Vec<u8>, CodecError> {
        self.render(doc)
    }

    fn extension(&self) -> &str {
        "docx"
    }
}

/// Read every file entry of a ZIP archive, preserving order
fn read_entries(bytes: &[u8]) -> Result<Vec<ZipEntry>, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let modified = file.last_modified().unwrap_or_default();
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        entries.push(ZipEntry {
            name,
            data,
            modified,
        });
    }
    Ok(entries)
}

fn part_xml(entry: &ZipEntry) -> Result<String, DocxError> {
    String::from_utf8(entry.data.clone()).map_err(|_| DocxError::Encoding(entry.name.clone()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceKind {
    Header,
    Footer,
}

/// Default header/footer relationship ids of each `<w:sectPr>`, in document order
fn section_references(document_xml: &str) -> Vec<Vec<(ReferenceKind, String)>> {
    SECT_PR_RE
        .find_iter(document_xml)
        .map(|sect| {
            REFERENCE_RE
                .captures_iter(sect.as_str())
                .filter_map(|caps| {
                    let attrs = attributes(caps.get(2).map_or("", |m| m.as_str()));
                    // first-page and even-page variants are not merged
                    if attrs.get("w:type").is_some_and(|t| *t != "default") {
                        return None;
                    }
                    let kind = match caps.get(1).map(|m| m.as_str()) {
                        Some("header") => ReferenceKind::Header,
                        _ => ReferenceKind::Footer,
                    };
                    attrs.get("r:id").map(|id| (kind, id.to_string()))
                })
                .collect()
        })
        .collect()
}

/// Relationship id → target from a .rels part
fn parse_relationships(rels_xml: &str) -> HashMap<String, String> {
    RELATIONSHIP_RE
        .captures_iter(rels_xml)
        .filter_map(|caps| {
            let attrs = attributes(caps.get(1).map_or("", |m| m.as_str()));
            if attrs.get("TargetMode") == Some(&"External") {
                return None;
            }
            match (attrs.get("Id"), attrs.get("Target")) {
                (Some(id), Some(target)) => Some((id.to_string(), target.to_string())),
                _ => None,
            }
        })
        .collect()
}

fn attributes(tag_body: &str) -> HashMap<&str, &str> {
    ATTRIBUTE_RE
        .captures_iter(tag_body)
        .filter_map(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
        .collect()
}

/// Resolve a relationship target of the main document part to a ZIP entry name
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target.trim_start_matches("./")),
    }
}

/// Parser stack frame
enum Frame {
    Root(Vec<Block>),
    Cell(Vec<Block>),
    Table(Table),
    Row(TableRow),
    Paragraph(Vec<Span>),
}

/// Build the block tree of one XML part
///
/// Paragraphs nested inside another paragraph (text boxes) are attached to
/// the nearest enclosing cell or body as siblings.
fn parse_blocks(part: usize, name: &str, xml: &str) -> Result<Vec<Block>, DocxError> {
    let mut stack = vec![Frame::Root(Vec::new())];
    let mut pos = 0;

    while let Some(caps) = ELEMENT_RE.captures_at(xml, pos) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        pos = whole.end();
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
        let tag = caps.get(2).map_or("", |m| m.as_str());

        match (tag, closing) {
            ("p", false) if self_closing => {
                push_block(&mut stack, Block::Paragraph(Container::default()), name)?;
            }
            ("p", false) => stack.push(Frame::Paragraph(Vec::new())),
            ("p", true) => match stack.pop() {
                Some(Frame::Paragraph(spans)) => {
                    push_block(&mut stack, Block::Paragraph(Container::new(spans)), name)?;
                }
                _ => return Err(structure(name, "unexpected </w:p>")),
            },
            ("tbl", false) if !self_closing => stack.push(Frame::Table(Table::default())),
            ("tbl", true) => match stack.pop() {
                Some(Frame::Table(table)) => push_block(&mut stack, Block::Table(table), name)?,
                _ => return Err(structure(name, "unexpected </w:tbl>")),
            },
            ("tr", false) if !self_closing => stack.push(Frame::Row(TableRow::default())),
            ("tr", true) => match (stack.pop(), stack.last_mut()) {
                (Some(Frame::Row(row)), Some(Frame::Table(table))) => table.rows.push(row),
                _ => return Err(structure(name, "unexpected </w:tr>")),
            },
            ("tc", false) if self_closing => match stack.last_mut() {
                Some(Frame::Row(row)) => row.cells.push(TableCell::default()),
                _ => return Err(structure(name, "<w:tc/> outside a table row")),
            },
            ("tc", false) => stack.push(Frame::Cell(Vec::new())),
            ("tc", true) => match (stack.pop(), stack.last_mut()) {
                (Some(Frame::Cell(blocks)), Some(Frame::Row(row))) => {
                    row.cells.push(TableCell { blocks });
                }
                _ => return Err(structure(name, "unexpected </w:tc>")),
            },
            ("t", false) if !self_closing => {
                let content_start = whole.end();
                let content_end = xml[content_start..]
                    .find(TEXT_CLOSE)
                    .map(|i| content_start + i)
                    .ok_or_else(|| structure(name, "unterminated <w:t>"))?;
                let element_end = content_end + TEXT_CLOSE.len();
                pos = element_end;

                let span = Span::with_origin(
                    unescape_xml(&xml[content_start..content_end]),
                    SpanOrigin {
                        part,
                        range: whole.start()..element_end,
                    },
                );
                match stack.last_mut() {
                    Some(Frame::Paragraph(spans)) => spans.push(span),
                    _ => log::warn!("Ignoring text outside a paragraph in {}", name),
                }
            }
            _ => {}
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(Frame::Root(blocks)), true) => Ok(blocks),
        _ => Err(structure(name, "unclosed paragraph or table")),
    }
}

/// Attach a finished block to the nearest enclosing body or cell
fn push_block(stack: &mut [Frame], block: Block, name: &str) -> Result<(), DocxError> {
    for frame in stack.iter_mut().rev() {
        match frame {
            Frame::Root(blocks) | Frame::Cell(blocks) => {
                blocks.push(block);
                return Ok(());
            }
            Frame::Paragraph(_) => continue,
            Frame::Table(_) | Frame::Row(_) => {
                return Err(structure(name, "block directly inside a table or row"));
            }
        }
    }
    Err(structure(name, "block outside the document body"))
}

/// Decoded text of the `<w:t>` element occupying `range`, if there is one
fn element_text(xml: &str, range: &Range<usize>) -> Option<String> {
    let element = xml.get(range.clone())?;
    let content = element.strip_suffix(TEXT_CLOSE)?;
    let open_end = content.find('>')?;
    Some(unescape_xml(&content[open_end + 1..]))
}

/// Replace `<w:t>` elements, last first so earlier ranges stay valid
fn apply_edits(xml: &str, mut edits: Vec<(Range<usize>, &str)>) -> String {
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut result = xml.to_string();
    for (range, text) in edits {
        result.replace_range(
            range,
            &format!(r#"<w:t xml:space="preserve">{}</w:t>"#, escape_xml(text)),
        );
    }
    result
}

/// Escape special XML characters
fn escape_xml(s: &str) -> String {
    quick_xml::escape::escape(s).into_owned()
}

/// Decode entities and character references, keeping the raw text if any is malformed
fn unescape_xml(s: &str) -> String {
    match quick_xml::escape::unescape(s) {
        Ok(text) => text.into_owned(),
        Err(e) => {
            log::debug!("Keeping undecodable text {:?}: {}", s, e);
            s.to_string()
        }
    }
}
