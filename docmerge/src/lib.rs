//! docmerge - template substitution engine
//!
//! Merges rows of tabular data into a formatted document template. Each
//! row yields its own copy of the template with `{{placeholder}}` markers
//! replaced by the row's values, while run-level formatting survives.
//!
//! Placeholders are matched to data columns by fuzzy similarity, so
//! `{{Product  name}}` still finds the `Product Name` column.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::pedantic))]
// Allow some pedantic lints that are too strict for this project
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::enum_variant_names)]

// Document tree and text primitives
pub mod document_model;
pub mod normalize;
pub mod splicer;

// Placeholder discovery and matching
pub mod fuzzy;
pub mod scanner;

// Substitution
pub mod batch;
pub mod merge;

// Inputs and outputs
pub mod archive;
pub mod codec;
pub mod docx;
pub mod merge_config;
pub mod report;
pub mod table_data;
