//! Seam between the merge engine and container file formats

use crate::document_model::Document;
use crate::docx::DocxError;
use thiserror::Error;

/// A container format that can supply a template and serialize merged copies
///
/// Implementations are shared read-only across worker threads while a batch
/// runs.
pub trait DocumentCodec: Sync {
    /// The parsed template tree
    fn template(&self) -> &Document;

    /// Serialize a (merged) copy of the template to bytes
    fn serialize(&self, doc: &Document) -> Result<Vec<u8>, CodecError>;

    /// File extension for serialized output, without the dot
    fn extension(&self) -> &str;
}

/// Errors raised while serializing a document
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("DOCX error: {0}")]
    Docx(#[from] DocxError),

    #[error("Document does not match its template: {0}")]
    Mismatch(String),
}

/// Renders each container as one line of plain text
///
/// Used for previews, where the formatting of the real container file does
/// not matter.
#[derive(Debug, Clone)]
pub struct PlainTextCodec {
    document: Document,
}

impl PlainTextCodec {
    /// Wrap a template tree
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

impl DocumentCodec for PlainTextCodec {
    fn template(&self) -> &Document {
        &self.document
    }

    fn serialize(&self, doc: &Document) -> Result<Vec<u8>, CodecError> {
        let lines: Vec<String> = doc.containers().iter().map(|c| c.text()).collect();
        Ok(lines.join("\n").into_bytes())
    }

    fn extension(&self) -> &str {
        "txt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_model::{Block, Container};

    #[test]
    fn test_plain_text_one_line_per_container() {
        let doc = Document {
            body: vec![
                Block::Paragraph(Container::from_pieces(&["a", "b"])),
                Block::Paragraph(Container::from_pieces(&["c"])),
            ],
            sections: vec![],
        };
        let codec = PlainTextCodec::new(doc.clone());
        assert_eq!(codec.serialize(&doc).unwrap(), b"ab\nc".to_vec());
        assert_eq!(codec.extension(), "txt");
    }
}
