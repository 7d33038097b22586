#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
//! Workbooks of named sheets for spreadsheet-driven tests.
//!
//! A [`Workbook`] is a set of named [`Sheet`]s. On disk it is a directory of CSV files, one per sheet, the sheet
//! name being the file stem: `arithmetic/plus.csv` is sheet `plus` of workbook `arithmetic`.

mod error;
mod sheet;

use std::fs;
use std::path::{Path, PathBuf};

pub use error::SheetError;
pub use sheet::{Row, Sheet};

/// A set of named sheets, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.csv` file of `dir` as a sheet.
    ///
    /// ## Errors
    ///
    /// - [`SheetError::Io`] if the directory or a file cannot be read
    /// - [`SheetError::Csv`] if a file is not valid CSV
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SheetError> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error(dir))? {
            let path = entry.map_err(io_error(dir))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut workbook = Self::new();
        for path in paths {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let text = fs::read_to_string(&path).map_err(io_error(&path))?;
            workbook = workbook.with_sheet(parse_sheet(name, &text)?);
        }

        tracing::debug!(dir = %dir.display(), sheets = workbook.sheets.len(), "loaded workbook");
        Ok(workbook)
    }

    /// A workbook holding a single sheet parsed from `text`.
    pub fn from_csv(name: impl Into<String>, text: &str) -> Result<Self, SheetError> {
        Ok(Self::new().with_sheet(parse_sheet(name.into(), text)?))
    }

    /// Add `sheet`, replacing any sheet with the same name.
    pub fn with_sheet(mut self, sheet: Sheet) -> Self {
        self.sheets.retain(|existing| existing.name() != sheet.name());
        let at = self
            .sheets
            .partition_point(|existing| existing.name() < sheet.name());
        self.sheets.insert(at, sheet);
        self
    }

    /// The sheet called `name`.
    pub fn sheet(&self, name: &str) -> Result<&Sheet, SheetError> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name() == name)
            .ok_or_else(|| SheetError::MissingSheet {
                name: name.to_string(),
                available: self.sheet_names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(Sheet::name)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SheetError {
    let path = path.to_path_buf();
    move |source| SheetError::Io { path, source }
}

fn parse_sheet(name: String, text: &str) -> Result<Sheet, SheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| SheetError::Csv {
            sheet: name.clone(),
            source,
        })?;
        records.push(record.iter().map(str::to_owned).collect());
    }
    Ok(Sheet::new(name, records))
}
