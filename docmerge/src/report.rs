//! Consolidated batch report
//!
//! The same data backs the console summary and the optional TOML report file.

use crate::batch::BatchPlan;
use crate::merge::{ReplacedValue, RowResult};
use itertools::Itertools;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Label used when a placeholder has no column
const NO_MATCH: &str = "No Match";

/// Errors writing the report file
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How one placeholder was mapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    /// Placeholder token without braces
    pub token: String,
    /// Column it maps to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Similarity score of the best candidate
    pub score: u8,
}

/// Outcome of one generated document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowReport {
    /// One-based row number
    pub row: usize,
    /// Output file name
    pub file: String,
    /// Tokens replaced in this document
    pub replaced: Vec<String>,
    /// What each replaced token became, and which column it came from
    pub values: Vec<ReplacedValue>,
    /// Tokens still present after substitution
    pub unreplaced: Vec<String>,
    /// Columns no replaced token drew from, in declared order
    pub unused_fields: Vec<String>,
    /// Stray brace strings left in the document
    pub malformed_braces: Vec<String>,
}

/// Everything that happened in one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Template path
    pub template: String,
    /// Data file path
    pub data: String,
    /// Fuzzy matching threshold
    pub threshold: u8,
    /// Distinct placeholder tokens in the template
    pub placeholders: Vec<String>,
    /// Column chosen for each placeholder, in token order
    pub mapping: Vec<MappingEntry>,
    /// One entry per generated document, in row order
    pub rows: Vec<RowReport>,
}

impl BatchReport {
    /// Collect the report for a finished batch
    ///
    /// # Parameters
    /// * `template` - Path of the template file
    /// * `data` - Path of the data file
    /// * `threshold` - Fuzzy threshold the mapping was built with
    /// * `plan` - Tokens and mapping of the batch
    /// * `results` - Row results in row order
    /// * `file_names` - Output name for each row, in row order
    pub fn new(
        template: &Path,
        data: &Path,
        threshold: u8,
        plan: &BatchPlan,
        results: &[RowResult],
        file_names: &[String],
    ) -> Self {
        let mapping = plan
            .mapping
            .iter()
            .map(|(token, m)| MappingEntry {
                token: token.to_string(),
                field: m.field.clone(),
                score: m.score,
            })
            .collect();

        let rows = results
            .iter()
            .map(|result| {
                let d = &result.diagnostics;
                RowReport {
                    row: result.row_index + 1,
                    file: file_names
                        .get(result.row_index)
                        .cloned()
                        .unwrap_or_default(),
                    replaced: d.replaced_tokens.iter().cloned().collect(),
                    values: d.values.clone(),
                    unreplaced: d.unreplaced_tokens.iter().cloned().collect(),
                    unused_fields: d.unused_fields.clone(),
                    malformed_braces: d.malformed_braces.iter().cloned().collect(),
                }
            })
            .collect();

        Self {
            template: template.display().to_string(),
            data: data.display().to_string(),
            threshold,
            placeholders: plan.tokens.iter().cloned().collect(),
            mapping,
            rows,
        }
    }

    /// Serialize the report as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Write the report as a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let content = self.to_toml()?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Human-readable summary of the placeholders and their mapping
    pub fn mapping_summary(&self) -> String {
        let mut out = String::new();
        let placeholders = if self.placeholders.is_empty() {
            "None found!".to_string()
        } else {
            self.placeholders.iter().join(", ")
        };
        let _ = writeln!(out, "Placeholders in template: {}", placeholders);
        let _ = writeln!(out, "Placeholder → column (threshold {}):", self.threshold);
        for entry in &self.mapping {
            let _ = writeln!(
                out,
                "  - {} → {} (Match Score: {})",
                entry.token,
                entry.field.as_deref().unwrap_or(NO_MATCH),
                entry.score
            );
        }
        out
    }

    /// Human-readable summary of every row
    ///
    /// Unused columns are listed only when `show_unused` is set.
    pub fn rows_summary(&self, show_unused: bool) -> String {
        let mut out = String::new();
        for row in &self.rows {
            let _ = writeln!(out, "Row {}: {}", row.row, row.file);
            let _ = writeln!(
                out,
                "  Replaced placeholders: {} found, {} not replaced",
                row.replaced.len(),
                row.unreplaced.len()
            );
            for v in &row.values {
                let _ = writeln!(out, "  - {} → {} (from '{}')", v.token, v.value, v.field);
            }
            let _ = writeln!(out, "  Not replaced: {}", list_or_none(&row.unreplaced));
            if show_unused {
                let unused = row.unused_fields.iter().sorted().cloned().collect_vec();
                let _ = writeln!(out, "  Columns not used: {}", list_or_none(&unused));
            }
            let _ = writeln!(
                out,
                "  Strings with {{ or }}: {}",
                list_or_none(&row.malformed_braces)
            );
        }
        out
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.iter().join(", ")
    }
}
