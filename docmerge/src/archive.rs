//! Naming and packaging of generated documents
//!
//! Output goes either into a single ZIP archive (when the target path ends
//! in `.zip`) or into a directory, one file per row.

use crate::table_data::Row;
use itertools::Itertools;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Placeholder used in file names when a naming column has no value
const UNKNOWN_NAME: &str = "unknown";

/// Packaging errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// A generated document with its file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedOutput {
    /// File name inside the archive or directory
    pub name: String,
    /// Document bytes
    pub bytes: Vec<u8>,
}

/// Where the outputs ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// One ZIP archive
    Zip,
    /// A directory of files
    Directory,
}

/// Replace every character that is not alphanumeric, `_`, `-` or `.` with `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File name for one row
///
/// The values of `name_fields` are joined with `_` and followed by
/// `_row_{n}` where `n` is one-based. A naming column without a value
/// contributes `unknown`. With no naming columns the name is `row_{n}`.
pub fn output_name(row: &Row, name_fields: &[String], row_index: usize, extension: &str) -> String {
    let number = row_index + 1;
    let stem = if name_fields.is_empty() {
        format!("row_{}", number)
    } else {
        let prefix = name_fields
            .iter()
            .map(|field| match row.get(field) {
                Some(value) if !value.is_empty() => value,
                _ => UNKNOWN_NAME,
            })
            .join("_");
        format!("{}_row_{}", prefix, number)
    };
    sanitize_filename(&format!("{}.{}", stem, extension))
}

/// File names for every row, in row order
pub fn output_names(rows: &[Row], name_fields: &[String], extension: &str) -> Vec<String> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| output_name(row, name_fields, index, extension))
        .collect()
}

/// Write outputs to `target`, as a ZIP if it ends in `.zip` and as a directory otherwise
pub fn write_outputs(target: &Path, outputs: &[NamedOutput]) -> Result<OutputKind, ArchiveError> {
    let is_zip = target
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

    if is_zip {
        write_zip(target, outputs)?;
        Ok(OutputKind::Zip)
    } else {
        write_dir(target, outputs)?;
        Ok(OutputKind::Directory)
    }
}

/// Pack every output into one ZIP archive
pub fn write_zip(path: &Path, outputs: &[NamedOutput]) -> Result<(), ArchiveError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    let file = File::create(path).map_err(|source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for output in outputs {
        writer.start_file(output.name.as_str(), options)?;
        writer
            .write_all(&output.bytes)
            .map_err(|source| ArchiveError::Io {
                path: path.to_path_buf(),
                source,
            })?;
    }
    writer.finish()?;

    log::info!("Wrote {} documents to {}", outputs.len(), path.display());
    Ok(())
}

/// Write every output as its own file under `dir`
pub fn write_dir(dir: &Path, outputs: &[NamedOutput]) -> Result<(), ArchiveError> {
    create_dir(dir)?;
    for output in outputs {
        let path = dir.join(&output.name);
        fs::write(&path, &output.bytes).map_err(|source| ArchiveError::Io { path, source })?;
    }

    log::info!("Wrote {} documents to {}", outputs.len(), dir.display());
    Ok(())
}

fn create_dir(dir: &Path) -> Result<(), ArchiveError> {
    fs::create_dir_all(dir).map_err(|source| ArchiveError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::read::ZipArchive;

    fn name_fields() -> Vec<String> {
        vec!["Product Name".to_string(), "Product Code".to_string()]
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("docmerge-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Lamp/Desk: 40W.docx"), "Lamp_Desk__40W.docx");
        assert_eq!(sanitize_filename("a-b_c.1"), "a-b_c.1");
        assert_eq!(sanitize_filename("Größe 2"), "Größe_2");
    }

    #[test]
    fn test_output_name_uses_name_fields() {
        let row = Row::from_pairs([("Product Name", "Desk Lamp"), ("Product Code", "DL-1")]);
        assert_eq!(
            output_name(&row, &name_fields(), 0, "docx"),
            "Desk_Lamp_DL-1_row_1.docx"
        );
    }

    #[test]
    fn test_output_name_missing_value_is_unknown() {
        let row = Row::from_pairs([("Product Name", "Fan"), ("Product Code", "")]);
        assert_eq!(
            output_name(&row, &name_fields(), 4, "docx"),
            "Fan_unknown_row_5.docx"
        );
    }

    #[test]
    fn test_output_name_without_name_fields() {
        assert_eq!(output_name(&Row::new(), &[], 2, "txt"), "row_3.txt");
    }

    #[test]
    fn test_output_names_in_row_order() {
        let rows = vec![
            Row::from_pairs([("Product Name", "A")]),
            Row::from_pairs([("Product Name", "B")]),
        ];
        assert_eq!(
            output_names(&rows, &name_fields(), "docx"),
            vec!["A_unknown_row_1.docx", "B_unknown_row_2.docx"]
        );
    }

    #[test]
    fn test_write_zip_contains_every_output() {
        let dir = temp_dir("zip");
        let path = dir.join("all_documents.zip");
        let outputs = vec![
            NamedOutput {
                name: "row_1.txt".to_string(),
                bytes: b"first".to_vec(),
            },
            NamedOutput {
                name: "row_2.txt".to_string(),
                bytes: b"second".to_vec(),
            },
        ];

        assert_eq!(write_outputs(&path, &outputs).unwrap(), OutputKind::Zip);

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive
            .by_name("row_2.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "second");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_dir() {
        let dir = temp_dir("dir");
        let outputs = vec![NamedOutput {
            name: "row_1.txt".to_string(),
            bytes: b"only".to_vec(),
        }];

        assert_eq!(write_outputs(&dir, &outputs).unwrap(), OutputKind::Directory);
        assert_eq!(fs::read(dir.join("row_1.txt")).unwrap(), b"only");

        fs::remove_dir_all(&dir).unwrap();
    }
}
