//! Templates produced by a third-party DOCX writer

use docmerge::batch;
use docmerge::codec::DocumentCodec;
use docmerge::docx::DocxTemplate;
use docmerge::fuzzy::FuzzyMatcher;
use docmerge::merge::MergeOptions;
use docmerge::table_data::Row;
use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};
use std::collections::BTreeMap;
use std::io::Cursor;

fn build_fixture() -> Vec<u8> {
    let cell = |text: &str| {
        TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
    };

    let docx = Docx::new()
        .add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("Product: ").bold())
                .add_run(Run::new().add_text("{{Product"))
                .add_run(Run::new().add_text(" Name}}").italic()),
        )
        .add_table(Table::new(vec![
            TableRow::new(vec![cell("Code"), cell("{{Product Code}}")]),
            TableRow::new(vec![cell("Lumens"), cell("{{Lumen Output}}")]),
        ]));

    let mut buffer = Cursor::new(Vec::new());
    docx.build().pack(&mut buffer).unwrap();
    buffer.into_inner()
}

fn texts(template: &DocxTemplate) -> Vec<String> {
    template
        .template()
        .containers()
        .iter()
        .map(|c| c.text())
        .filter(|t| !t.is_empty())
        .collect()
}

#[test]
fn test_fixture_parses_body_and_table() {
    let template = DocxTemplate::from_bytes(&build_fixture()).unwrap();
    assert_eq!(
        texts(&template),
        vec![
            "Product: {{Product Name}}",
            "Code",
            "{{Product Code}}",
            "Lumens",
            "{{Lumen Output}}",
        ]
    );
}

#[test]
fn test_fixture_merges() {
    let template = DocxTemplate::from_bytes(&build_fixture()).unwrap();
    let fields: Vec<String> = ["Product Name", "Product Code", "Lumen output"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let plan = batch::plan(&template, &fields, &FuzzyMatcher::default(), &BTreeMap::new());
    let rows = vec![Row::from_pairs([
        ("Product Name", "Desk Lamp"),
        ("Product Code", "DL-1"),
        ("Lumen output", "450"),
    ])];

    let results = batch::generate(
        &rows,
        &template,
        &plan.mapping,
        &fields,
        &MergeOptions::default(),
    )
    .unwrap();
    assert!(results[0].diagnostics.unreplaced_tokens.is_empty());

    let merged = DocxTemplate::from_bytes(&results[0].bytes).unwrap();
    assert_eq!(
        texts(&merged),
        vec!["Product: Desk Lamp", "Code", "DL-1", "Lumens", "450"]
    );
}
