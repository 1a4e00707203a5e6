//! Per-row substitution driver
//!
//! Each row is merged into an independent clone of the template and moves
//! through four states:
//!
//! `Initialized → Substituting → Rescanned → Done`
//!
//! Substitution is single-pass. Marker occurrences are located in each
//! container's text as it was before the row was applied, so a field value
//! that itself contains `{{...}}` is inserted literally and never expanded.

use crate::codec::{CodecError, DocumentCodec};
use crate::document_model::Document;
use crate::fuzzy::Mapping;
use crate::scanner;
use crate::splicer;
use crate::table_data::Row;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::ops::Range;

/// Row-independent settings for substitution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Text substituted when a row has no value (or an empty one) for a mapped field
    pub missing_value: String,
}

/// Where a row merge currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// Template cloned and bound to the row
    Initialized,
    /// Mapped markers have been replaced
    Substituting,
    /// Leftover tokens and malformed braces have been collected
    Rescanned,
    /// Document serialized and diagnostics computed
    Done,
}

/// The text a replaced token received in one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacedValue {
    pub token: String,
    /// Column the value came from
    pub field: String,
    /// Inserted text, after missing-value fallback
    pub value: String,
}

/// What happened to one row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowDiagnostics {
    /// Template tokens no longer present after substitution
    pub replaced_tokens: BTreeSet<String>,
    /// Value inserted for each replaced token, in token order
    pub values: Vec<ReplacedValue>,
    /// Tokens still present after substitution
    pub unreplaced_tokens: BTreeSet<String>,
    /// Fields not consumed by any replaced token, in declared order
    pub unused_fields: Vec<String>,
    /// Stray or single-brace strings found after substitution
    pub malformed_braces: BTreeSet<String>,
}

/// The output of one row: document bytes plus diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowResult {
    /// Zero-based index of the originating data row
    pub row_index: usize,
    /// Serialized document
    pub bytes: Vec<u8>,
    /// Replacement bookkeeping for the row
    pub diagnostics: RowDiagnostics,
}

/// Merge of one data row into a private copy of the template
pub struct RowMerge<'a> {
    state: MergeState,
    row_index: usize,
    document: Document,
    mapping: &'a Mapping,
    fields: &'a [String],
    /// (marker, value) for every resolved token
    substitutions: Vec<(String, String)>,
    /// (token, field) behind each substitution
    sources: Vec<(String, String)>,
    unreplaced: BTreeSet<String>,
    malformed: BTreeSet<String>,
}

impl<'a> RowMerge<'a> {
    /// Clone the template and bind it to a row
    ///
    /// # Parameters
    /// * `row_index` - Zero-based index of the row in the batch
    /// * `template` - The template tree; left untouched
    /// * `row` - Values for this row
    /// * `mapping` - Token → field mapping shared by the batch
    /// * `fields` - The batch's field set, in declared order
    /// * `options` - Missing-value handling
    pub fn new(
        row_index: usize,
        template: &Document,
        row: &Row,
        mapping: &'a Mapping,
        fields: &'a [String],
        options: &MergeOptions,
    ) -> Self {
        let (substitutions, sources): (Vec<_>, Vec<_>) = mapping
            .resolved()
            .map(|(token, field)| {
                let value = match row.get(field) {
                    Some(v) if !v.is_empty() => v.to_string(),
                    _ => options.missing_value.clone(),
                };
                (
                    (scanner::marker(token), value),
                    (token.to_string(), field.to_string()),
                )
            })
            .unzip();

        log::debug!("Row {}: initialized", row_index);
        Self {
            state: MergeState::Initialized,
            row_index,
            document: template.clone(),
            mapping,
            fields,
            substitutions,
            sources,
            unreplaced: BTreeSet::new(),
            malformed: BTreeSet::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> MergeState {
        self.state
    }

    /// The row's working copy of the document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Replace every occurrence of every mapped marker, in every container
    ///
    /// Returns the number of replacements made. Calling it again is a no-op.
    pub fn substitute(&mut self) -> usize {
        if self.state != MergeState::Initialized {
            return 0;
        }

        let mut count = 0;
        for container in self.document.containers_mut() {
            let hits = locate_markers(&container.text(), &self.substitutions);
            // right to left, so earlier ranges stay valid
            for (range, idx) in hits.into_iter().rev() {
                if splicer::replace_range(container, range, &self.substitutions[idx].1) {
                    count += 1;
                }
            }
        }

        log::debug!("Row {}: substituted {} markers", self.row_index, count);
        self.state = MergeState::Substituting;
        count
    }

    /// Collect leftover tokens and malformed braces
    pub fn rescan(&mut self) {
        if self.state == MergeState::Initialized {
            self.substitute();
        }
        if self.state != MergeState::Substituting {
            return;
        }

        self.unreplaced = scanner::extract_tokens(&self.document);
        self.malformed = scanner::find_malformed(&self.document);
        log::debug!(
            "Row {}: rescanned, {} unreplaced, {} malformed",
            self.row_index,
            self.unreplaced.len(),
            self.malformed.len()
        );
        self.state = MergeState::Rescanned;
    }

    /// Serialize the document and compute the row's diagnostics
    pub fn finish<C: DocumentCodec + ?Sized>(mut self, codec: &C) -> Result<RowResult, CodecError> {
        self.rescan();
        let bytes = codec.serialize(&self.document)?;
        let diagnostics = self.diagnostics();
        self.state = MergeState::Done;
        log::debug!("Row {}: done ({} bytes)", self.row_index, bytes.len());

        Ok(RowResult {
            row_index: self.row_index,
            bytes,
            diagnostics,
        })
    }

    fn diagnostics(&self) -> RowDiagnostics {
        let replaced_tokens: BTreeSet<String> = self
            .mapping
            .tokens()
            .filter(|t| !self.unreplaced.contains(*t))
            .map(str::to_string)
            .collect();

        let used_fields: HashSet<&str> = replaced_tokens
            .iter()
            .filter_map(|t| self.mapping.get(t).and_then(|m| m.field.as_deref()))
            .collect();

        let unused_fields = self
            .fields
            .iter()
            .filter(|f| !used_fields.contains(f.as_str()))
            .cloned()
            .collect();

        let values = self
            .sources
            .iter()
            .zip(&self.substitutions)
            .filter(|((token, _), _)| replaced_tokens.contains(token))
            .map(|((token, field), (_, value))| ReplacedValue {
                token: token.clone(),
                field: field.clone(),
                value: value.clone(),
            })
            .collect();

        RowDiagnostics {
            replaced_tokens,
            values,
            unreplaced_tokens: self.unreplaced.clone(),
            unused_fields,
            malformed_braces: self.malformed.clone(),
        }
    }
}

/// Non-overlapping marker occurrences in `text`, sorted by position
///
/// Overlaps are resolved leftmost-first; at the same start the longer marker wins.
fn locate_markers(text: &str, substitutions: &[(String, String)]) -> Vec<(Range<usize>, usize)> {
    let mut hits: Vec<(Range<usize>, usize)> = substitutions
        .iter()
        .enumerate()
        .flat_map(|(idx, (marker, _))| {
            text.match_indices(marker.as_str())
                .map(move |(start, m)| (start..start + m.len(), idx))
        })
        .collect();
    hits.sort_by(|a, b| a.0.start.cmp(&b.0.start).then(b.0.end.cmp(&a.0.end)));

    let mut cursor = 0;
    hits.retain(|(range, _)| {
        if range.start < cursor {
            return false;
        }
        cursor = range.end;
        true
    });
    hits
}
