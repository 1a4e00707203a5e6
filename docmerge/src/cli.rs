//! Command-line interface definitions for docmerge

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI structure for the docmerge application
#[derive(Parser)]
#[command(name = "docmerge")]
#[command(version)]
#[command(about = "Merge tabular data into formatted document templates", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand that reads a template and data
#[derive(clap::Args, Debug, Clone)]
pub struct MergeInputs {
    /// DOCX template containing {{placeholder}} markers
    #[arg(value_name = "TEMPLATE")]
    pub template: PathBuf,

    /// CSV or Excel (.xlsx) data file whose header row names the columns
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// Minimum match score (0-100) for mapping a placeholder to a column
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub threshold: Option<u8>,

    /// Configuration file (defaults to docmerge.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Available subcommands for docmerge
#[derive(Subcommand)]
pub enum Commands {
    /// Show the placeholders in a template and how they map to data columns
    Inspect {
        #[command(flatten)]
        inputs: MergeInputs,
    },

    /// Generate one document per data row
    Generate {
        #[command(flatten)]
        inputs: MergeInputs,

        /// Output path: a .zip archive or a directory
        #[arg(short, long, default_value = "all_documents.zip")]
        output: PathBuf,

        /// Write a TOML report of the batch to this path
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// List data columns that no placeholder used
        #[arg(long)]
        show_unused: bool,
    },

    /// Print the merged text of a single row without writing files
    Preview {
        #[command(flatten)]
        inputs: MergeInputs,

        /// One-based row number to preview
        #[arg(long, default_value_t = 1)]
        row: usize,
    },
}
