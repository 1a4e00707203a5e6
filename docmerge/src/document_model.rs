//! Document model for template documents
//!
//! A template is a forest of [`Container`]s: one per logical line of content
//! (a body paragraph, a table-cell paragraph, a header or footer paragraph).
//! Each container is an ordered list of [`Span`]s, where a span is a run of
//! text sharing one formatting identity.
//!
//! The model is format-agnostic. Codecs (see [`crate::docx`]) build it from a
//! container file and write it back, using [`SpanOrigin`] to locate each span
//! in its source part.

use std::ops::Range;

/// Location of a span in the part it was read from
///
/// Opaque to the merge engine; only the codec that produced it reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanOrigin {
    /// Index of the source part within the codec
    pub part: usize,
    /// Byte range of the span's element within the part
    pub range: Range<usize>,
}

/// A contiguous run of text with one formatting identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// The text content
    pub text: String,

    /// Where the span came from (None for spans built in memory)
    pub origin: Option<SpanOrigin>,
}

impl Span {
    /// Create a span with no source location
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: None,
        }
    }

    /// Create a span read from a codec part
    pub fn with_origin(text: impl Into<String>, origin: SpanOrigin) -> Self {
        Self {
            text: text.into(),
            origin: Some(origin),
        }
    }
}

/// An ordered sequence of spans forming one logical line of text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    /// The spans, in reading order
    pub spans: Vec<Span>,
}

impl Container {
    /// Create a container from its spans
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    /// Create a container from plain text pieces, one span per piece
    pub fn from_pieces<S: AsRef<str>>(pieces: &[S]) -> Self {
        Self {
            spans: pieces.iter().map(|p| Span::new(p.as_ref())).collect(),
        }
    }

    /// Concatenated text of all spans
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Byte range of each span within [`Container::text`]
    ///
    /// Recomputed on every call so that it always reflects the current spans.
    pub fn span_ranges(&self) -> Vec<Range<usize>> {
        let mut offset = 0;
        self.spans
            .iter()
            .map(|span| {
                let start = offset;
                offset += span.text.len();
                start..offset
            })
            .collect()
    }

    /// Whether the container has no text at all
    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }
}

/// A block-level element: a paragraph or a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A paragraph of formatted spans
    Paragraph(Container),
    /// A table whose cells hold further blocks
    Table(Table),
}

/// A table of rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Rows, top to bottom
    pub rows: Vec<TableRow>,
}

/// A table row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    /// Cells, left to right
    pub cells: Vec<TableCell>,
}

/// A table cell; may contain nested tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCell {
    /// Blocks inside the cell
    pub blocks: Vec<Block>,
}

/// Header and footer content of one document section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    /// Header blocks
    pub header: Vec<Block>,
    /// Footer blocks
    pub footer: Vec<Block>,
}

/// A template document
///
/// Cloning a document yields an independent tree; mutations on the clone never
/// reach the original.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Body blocks
    pub body: Vec<Block>,
    /// Sections, each with its header and footer
    pub sections: Vec<Section>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// All containers in traversal order
    ///
    /// The order is fixed: body paragraphs, then body tables depth-first,
    /// then for each section its header followed by its footer. Within any
    /// block list, paragraphs come before tables.
    pub fn containers(&self) -> Vec<&Container> {
        let mut out = Vec::new();
        collect_containers(&self.body, &mut out);
        for section in &self.sections {
            collect_containers(&section.header, &mut out);
            collect_containers(&section.footer, &mut out);
        }
        out
    }

    /// Mutable access to all containers, in the same order as [`Document::containers`]
    pub fn containers_mut(&mut self) -> Vec<&mut Container> {
        let mut out = Vec::new();
        collect_containers_mut(&mut self.body, &mut out);
        for section in &mut self.sections {
            collect_containers_mut(&mut section.header, &mut out);
            collect_containers_mut(&mut section.footer, &mut out);
        }
        out
    }

    /// Number of containers in the document
    pub fn container_count(&self) -> usize {
        self.containers().len()
    }
}

fn collect_containers<'a>(blocks: &'a [Block], out: &mut Vec<&'a Container>) {
    let mut tables = Vec::new();
    for block in blocks {
        match block {
            Block::Paragraph(container) => out.push(container),
            Block::Table(table) => tables.push(table),
        }
    }
    for table in tables {
        for row in &table.rows {
            for cell in &row.cells {
                collect_containers(&cell.blocks, out);
            }
        }
    }
}

fn collect_containers_mut<'a>(blocks: &'a mut [Block], out: &mut Vec<&'a mut Container>) {
    let mut tables = Vec::new();
    for block in blocks.iter_mut() {
        match block {
            Block::Paragraph(container) => out.push(container),
            Block::Table(table) => tables.push(table),
        }
    }
    for table in tables {
        for row in &mut table.rows {
            for cell in &mut row.cells {
                collect_containers_mut(&mut cell.blocks, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Block {
        Block::Paragraph(Container::from_pieces(&[text]))
    }

    fn table_of(blocks: Vec<Block>) -> Block {
        Block::Table(Table {
            rows: vec![TableRow {
                cells: vec![TableCell { blocks }],
            }],
        })
    }

    #[test]
    fn test_span_ranges_follow_span_lengths() {
        let container = Container::from_pieces(&["ab", "", "cde"]);
        assert_eq!(container.span_ranges(), vec![0..2, 2..2, 2..5]);
        assert_eq!(container.text(), "abcde");
    }

    #[test]
    fn test_traversal_order_is_body_tables_then_sections() {
        let doc = Document {
            body: vec![
                paragraph("first"),
                table_of(vec![table_of(vec![paragraph("nested")]), paragraph("cell")]),
                paragraph("second"),
            ],
            sections: vec![Section {
                header: vec![paragraph("header")],
                footer: vec![paragraph("footer")],
            }],
        };

        let texts: Vec<String> = doc.containers().iter().map(|c| c.text()).collect();
        assert_eq!(
            texts,
            vec!["first", "second", "cell", "nested", "header", "footer"]
        );
    }

    #[test]
    fn test_containers_mut_matches_containers_order() {
        let mut doc = Document {
            body: vec![table_of(vec![paragraph("a")]), paragraph("b")],
            sections: vec![],
        };
        let expected: Vec<String> = doc.containers().iter().map(|c| c.text()).collect();
        let actual: Vec<String> = doc.containers_mut().iter().map(|c| c.text()).collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_clone_is_independent() {
        let template = Document {
            body: vec![paragraph("x")],
            sections: vec![],
        };
        let mut copy = template.clone();
        copy.containers_mut()[0].spans[0].text = "y".to_string();
        assert_eq!(template.containers()[0].text(), "x");
    }
}
