//! docmerge - template substitution tool
//!
//! A CLI tool that fills a DOCX template with one row of CSV or Excel data per
//! generated document.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::pedantic))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(missing_docs))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands, MergeInputs};
use docmerge::archive::{self, NamedOutput, OutputKind};
use docmerge::batch::{self, BatchPlan};
use docmerge::codec::{DocumentCodec, PlainTextCodec};
use docmerge::docx::DocxTemplate;
use docmerge::fuzzy::FuzzyMatcher;
use docmerge::merge::{MergeOptions, RowMerge};
use docmerge::merge_config::{MergeConfig, CONFIG_FILE_NAME};
use docmerge::report::BatchReport;
use docmerge::scanner;
use docmerge::table_data::DataTable;
use itertools::Itertools;
use std::path::{Path, PathBuf};

/// Main entry point for the docmerge CLI application
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

/// Run the CLI application
fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { inputs } => {
            handle_inspect_command(&inputs)?;
        }

        Commands::Generate {
            inputs,
            output,
            report,
            show_unused,
        } => {
            handle_generate_command(&inputs, output, report, show_unused)?;
        }

        Commands::Preview { inputs, row } => {
            handle_preview_command(&inputs, row)?;
        }
    }

    Ok(())
}

/// Template, data and settings loaded for one invocation
struct Session {
    template: DocxTemplate,
    data: DataTable,
    config: MergeConfig,
    plan: BatchPlan,
}

impl Session {
    fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            missing_value: self.config.missing_value.clone(),
        }
    }
}

/// Initialize logging when verbose output or RUST_LOG is requested
fn init_logging(verbose: bool) {
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        env_logger::init();
    }
}

/// Resolve configuration: explicit file, then docmerge.toml, then CLI overrides
fn load_config(inputs: &MergeInputs) -> Result<MergeConfig> {
    let mut config = match &inputs.config {
        Some(path) => MergeConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => MergeConfig::load_or_default(CONFIG_FILE_NAME)
            .with_context(|| format!("Failed to load {}", CONFIG_FILE_NAME))?,
    };

    if let Some(threshold) = inputs.threshold {
        config.threshold = threshold;
    }
    Ok(config)
}

/// Load template, data and configuration, and map placeholders to columns
fn open_session(inputs: &MergeInputs) -> Result<Session> {
    init_logging(inputs.verbose);

    let config = load_config(inputs)?;

    println!("Template: {}", inputs.template.display());
    println!("Data: {}", inputs.data.display());

    let template = DocxTemplate::open(&inputs.template)
        .with_context(|| format!("Failed to read template {}", inputs.template.display()))?;
    let data = DataTable::from_path(&inputs.data)
        .with_context(|| format!("Failed to read data file {}", inputs.data.display()))?;
    println!(
        "✓ Loaded {} rows with {} columns",
        data.len(),
        data.fields.len()
    );

    let plan = batch::plan(
        &template,
        &data.fields,
        &FuzzyMatcher::new(config.threshold),
        &config.overrides,
    );

    Ok(Session {
        template,
        data,
        config,
        plan,
    })
}

/// Handle the inspect command
fn handle_inspect_command(inputs: &MergeInputs) -> Result<()> {
    let session = open_session(inputs)?;

    let report = BatchReport::new(
        &inputs.template,
        &inputs.data,
        session.config.threshold,
        &session.plan,
        &[],
        &[],
    );
    println!("\n{}", report.mapping_summary());

    let malformed = scanner::find_malformed(session.template.template());
    if !malformed.is_empty() {
        println!(
            "Strings with {{ or }} in template: {}",
            malformed.iter().join(", ")
        );
    }

    Ok(())
}

/// Handle the generate command
fn handle_generate_command(
    inputs: &MergeInputs,
    output: PathBuf,
    report_path: Option<PathBuf>,
    show_unused: bool,
) -> Result<()> {
    let session = open_session(inputs)?;

    println!("\nGenerating documents...");
    let results = batch::generate(
        &session.data.rows,
        &session.template,
        &session.plan.mapping,
        &session.data.fields,
        &session.merge_options(),
    )
    .context("Failed to generate documents")?;
    println!("✓ Generated {} documents", results.len());

    let names = archive::output_names(
        &session.data.rows,
        &session.config.name_fields,
        session.template.extension(),
    );
    let report = BatchReport::new(
        &inputs.template,
        &inputs.data,
        session.config.threshold,
        &session.plan,
        &results,
        &names,
    );

    let outputs: Vec<NamedOutput> = results
        .into_iter()
        .zip(names)
        .map(|(result, name)| NamedOutput {
            name,
            bytes: result.bytes,
        })
        .collect();

    let kind = archive::write_outputs(&output, &outputs)
        .with_context(|| format!("Failed to write output {}", output.display()))?;
    match kind {
        OutputKind::Zip => println!("✓ Successfully wrote archive: {}", output.display()),
        OutputKind::Directory => println!("✓ Successfully wrote directory: {}", output.display()),
    }

    println!("\n{}", report.mapping_summary());
    print!("{}", report.rows_summary(show_unused));

    if let Some(path) = report_path {
        write_report(&report, &path)?;
    }

    println!("\n✓ Merge completed successfully!");
    Ok(())
}

fn write_report(report: &BatchReport, path: &Path) -> Result<()> {
    report
        .save(path)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    println!("✓ Successfully wrote report: {}", path.display());
    Ok(())
}

/// Handle the preview command
fn handle_preview_command(inputs: &MergeInputs, row_number: usize) -> Result<()> {
    let session = open_session(inputs)?;

    if row_number == 0 || row_number > session.data.len() {
        bail!(
            "Row {} is out of range (data has {} rows)",
            row_number,
            session.data.len()
        );
    }
    let index = row_number - 1;

    let preview = PlainTextCodec::new(session.template.template().clone());
    let result = RowMerge::new(
        index,
        preview.template(),
        &session.data.rows[index],
        &session.plan.mapping,
        &session.data.fields,
        &session.merge_options(),
    )
    .finish(&preview)
    .with_context(|| format!("Failed to merge row {}", row_number))?;

    println!("\n--- Row {} ---", row_number);
    println!("{}", String::from_utf8_lossy(&result.bytes));

    let d = &result.diagnostics;
    println!(
        "\nReplaced placeholders: {} found, {} not replaced",
        d.replaced_tokens.len(),
        d.unreplaced_tokens.len()
    );
    Ok(())
}
