//! Batch generation: one merged document per data row
//!
//! 1. **Plan**: scan the template once and build the token → field mapping
//! 2. **Generate**: merge every row into its own clone of the template
//!
//! Rows share nothing mutable, so they are processed in parallel when the
//! `parallel` feature is enabled. Results always come back in row order.

use crate::codec::{CodecError, DocumentCodec};
use crate::fuzzy::{FuzzyMatcher, Mapping};
use crate::merge::{MergeOptions, RowMerge, RowResult};
use crate::scanner;
use crate::table_data::Row;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Batch errors
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Failed to serialize row {row}: {source}")]
    Serialize {
        row: usize,
        #[source]
        source: CodecError,
    },
}

/// Everything decided once per batch, before any row is merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    /// Distinct tokens found in the template
    pub tokens: BTreeSet<String>,
    /// Token → field mapping used for every row
    pub mapping: Mapping,
}

/// Scan the template and map its tokens onto the field set
///
/// # Parameters
/// * `codec` - Supplies the template tree
/// * `fields` - Column names in declared order
/// * `matcher` - Fuzzy matcher with its acceptance threshold
/// * `overrides` - Explicit token → column assignments
pub fn plan<C: DocumentCodec + ?Sized>(
    codec: &C,
    fields: &[String],
    matcher: &FuzzyMatcher,
    overrides: &BTreeMap<String, String>,
) -> BatchPlan {
    let tokens = scanner::extract_tokens(codec.template());
    let mapping = matcher.build_mapping(&tokens, fields, overrides);
    log::info!(
        "Found {} placeholders, {} mapped to columns (threshold {})",
        tokens.len(),
        mapping.resolved().count(),
        matcher.threshold()
    );
    BatchPlan { tokens, mapping }
}

/// Merge every row and serialize the results
///
/// # Returns
/// * `Ok(Vec<RowResult>)` - One result per row, in row order (empty for no rows)
/// * `Err(BatchError)` - A merged document could not be serialized
pub fn generate<C: DocumentCodec + ?Sized>(
    rows: &[Row],
    codec: &C,
    mapping: &Mapping,
    fields: &[String],
    options: &MergeOptions,
) -> Result<Vec<RowResult>, BatchError> {
    log::info!("Generating {} documents", rows.len());

    let merge_row = |(index, row): (usize, &Row)| {
        RowMerge::new(index, codec.template(), row, mapping, fields, options)
            .finish(codec)
            .map_err(|source| BatchError::Serialize { row: index, source })
    };

    #[cfg(feature = "parallel")]
    let results: Result<Vec<_>, _> = rows.par_iter().enumerate().map(merge_row).collect();

    #[cfg(not(feature = "parallel"))]
    let results: Result<Vec<_>, _> = rows.iter().enumerate().map(merge_row).collect();

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PlainTextCodec;
    use crate::document_model::{Block, Container, Document};

    fn codec(text: &str) -> PlainTextCodec {
        PlainTextCodec::new(Document {
            body: vec![Block::Paragraph(Container::from_pieces(&[text]))],
            sections: vec![],
        })
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_maps_tokens_once() {
        let codec = codec("{{Product Name}} {{code}} {{Nothing Like It}}");
        let fields = fields(&["Product Name", "Code"]);
        let plan = plan(&codec, &fields, &FuzzyMatcher::default(), &BTreeMap::new());

        assert_eq!(plan.tokens.len(), 3);
        assert_eq!(plan.mapping.resolved().count(), 2);
        assert_eq!(
            plan.mapping.get("code").and_then(|m| m.field.as_deref()),
            Some("Code")
        );
    }

    #[test]
    fn test_generate_keeps_row_order() {
        let codec = codec("Item {{Name}}");
        let fields = fields(&["Name"]);
        let plan = plan(&codec, &fields, &FuzzyMatcher::default(), &BTreeMap::new());
        let rows: Vec<Row> = (0..32)
            .map(|i| Row::from_pairs([("Name", i.to_string())]))
            .collect();

        let results = generate(&rows, &codec, &plan.mapping, &fields, &MergeOptions::default())
            .unwrap();

        assert_eq!(results.len(), 32);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.row_index, i);
            assert_eq!(result.bytes, format!("Item {}", i).into_bytes());
        }
    }

    #[test]
    fn test_generate_no_rows() {
        let codec = codec("{{Name}}");
        let results = generate(&[], &codec, &Mapping::new(), &[], &MergeOptions::default())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_generate_is_deterministic() {
        let codec = codec("{{A}} {b} {{C}}");
        let fields = fields(&["A", "B"]);
        let plan = plan(&codec, &fields, &FuzzyMatcher::default(), &BTreeMap::new());
        let rows = vec![
            Row::from_pairs([("A", "1"), ("B", "2")]),
            Row::from_pairs([("A", "3")]),
        ];

        let first = generate(&rows, &codec, &plan.mapping, &fields, &MergeOptions::default())
            .unwrap();
        let second = generate(&rows, &codec, &plan.mapping, &fields, &MergeOptions::default())
            .unwrap();
        assert_eq!(first, second);
    }
}
