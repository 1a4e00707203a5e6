//! Tabular merge data loaded from CSV or an Excel workbook

use calamine::{open_workbook, Data, Reader, Xlsx};
use std::io::{Read, Seek};
use std::path::Path;
use thiserror::Error;

/// Extensions read as Excel workbooks; everything else is read as CSV
const WORKBOOK_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

/// Errors loading merge data
#[derive(Error, Debug)]
pub enum TableDataError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("Workbook has no worksheets")]
    NoSheet,

    #[error("Data file has no header row")]
    MissingHeader,
}

/// One data row: column name → display value, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    entries: Vec<(String, String)>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from (column, value) pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of a column; the first one wins when a column name repeats
    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// All (column, value) pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The merge data: a field set plus rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTable {
    /// Column names in declared order
    pub fields: Vec<String>,

    /// Data rows
    pub rows: Vec<Row>,
}

impl DataTable {
    /// Load a data file, choosing the reader from its extension
    ///
    /// `.xlsx` and `.xlsm` files are read as Excel workbooks, anything else as CSV.
    pub fn from_path(path: &Path) -> Result<Self, TableDataError> {
        let is_workbook = path.extension().is_some_and(|ext| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        });
        if is_workbook {
            Self::from_xlsx_path(path)
        } else {
            Self::from_csv_path(path)
        }
    }

    /// Load a CSV file whose first record is the header row
    ///
    /// # Parameters
    /// * `path` - Path to the CSV file
    ///
    /// # Returns
    /// * `Ok(DataTable)` - Fields from the header, one row per record (may be zero rows)
    /// * `Err(TableDataError)` - Error reading or parsing the file
    pub fn from_csv_path(path: &Path) -> Result<Self, TableDataError> {
        log::info!("Reading merge data from {}", path.display());
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;
        Self::from_csv(reader)
    }

    /// Load CSV data from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableDataError> {
        Self::from_csv(csv::ReaderBuilder::new().flexible(true).from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, TableDataError> {
        let fields: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            // short records simply lack their trailing columns
            rows.push(Row::from_pairs(
                fields.iter().cloned().zip(record.iter().map(str::to_string)),
            ));
        }

        Self::with_fields(fields, rows)
    }

    /// Load the first worksheet of an Excel workbook
    ///
    /// The first row is the header row; every cell is converted to its
    /// display string and empty cells become empty values.
    pub fn from_xlsx_path(path: &Path) -> Result<Self, TableDataError> {
        log::info!("Reading merge data from workbook {}", path.display());
        let workbook: Xlsx<_> = open_workbook(path)?;
        Self::from_workbook(workbook)
    }

    /// Load the first worksheet of an Excel workbook from any seekable reader
    pub fn from_xlsx_reader<R: Read + Seek>(reader: R) -> Result<Self, TableDataError> {
        Self::from_workbook(Xlsx::new(reader)?)
    }

    fn from_workbook<R: Read + Seek>(mut workbook: Xlsx<R>) -> Result<Self, TableDataError> {
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(TableDataError::NoSheet)??;

        let mut cells = range.rows();
        let fields: Vec<String> = match cells.next() {
            Some(header) => header.iter().map(cell_text).collect(),
            None => Vec::new(),
        };

        let rows = cells
            .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
            .map(|cells| Row::from_pairs(fields.iter().cloned().zip(cells.iter().map(cell_text))))
            .collect();

        Self::with_fields(fields, rows)
    }

    fn with_fields(fields: Vec<String>, rows: Vec<Row>) -> Result<Self, TableDataError> {
        if fields.is_empty() {
            return Err(TableDataError::MissingHeader);
        }

        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if !seen.insert(field.as_str()) {
                log::warn!("Column '{}' appears more than once; using the first", field);
            }
        }

        log::info!("Loaded {} rows with {} columns", rows.len(), fields.len());
        Ok(Self { fields, rows })
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Display string of one worksheet cell
///
/// Whole floats print without a fractional part, so `40.0` reads as `40`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}
