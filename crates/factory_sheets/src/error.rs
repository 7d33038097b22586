use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while loading a workbook or reading its cells.
#[derive(Debug, Error, Diagnostic)]
pub enum SheetError {
    #[error("failed to read {}", path.display())]
    #[diagnostic(code(factory_sheets::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed sheet `{sheet}`")]
    #[diagnostic(code(factory_sheets::csv))]
    Csv {
        sheet: String,
        #[source]
        source: csv::Error,
    },

    #[error("no sheet named `{name}`")]
    #[diagnostic(code(factory_sheets::missing_sheet), help("available sheets: {available}"))]
    MissingSheet { name: String, available: String },

    #[error("no cell {column} in row {row}")]
    #[diagnostic(code(factory_sheets::missing_cell))]
    MissingCell { column: usize, row: usize },

    #[error("cell {column} in row {row} is not numeric: `{value}`")]
    #[diagnostic(code(factory_sheets::not_numeric))]
    NotNumeric { column: usize, row: usize, value: String },
}
