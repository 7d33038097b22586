//! Sheets and rows.

use crate::SheetError;

/// One named table of cells. Row 0 is the first line of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    name: String,
    rows: Vec<Row>,
}

impl Sheet {
    pub(crate) fn new(name: impl Into<String>, records: Vec<Vec<String>>) -> Self {
        let rows = records
            .into_iter()
            .enumerate()
            .map(|(index, cells)| Row { index, cells })
            .collect();
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every row, header included.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Data rows: everything after the first row.
    pub fn rows_skipping_header(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().skip(1)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One row of a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    index: usize,
    cells: Vec<String>,
}

impl Row {
    /// Zero-based position of the row in its sheet.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The trimmed text of a cell; blank cells count as absent.
    pub fn text_column(&self, column: usize) -> Result<&str, SheetError> {
        self.cells
            .get(column)
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .ok_or(SheetError::MissingCell {
                column,
                row: self.index,
            })
    }

    /// A numeric cell read as floating point and truncated toward zero.
    pub fn int_column(&self, column: usize) -> Result<i64, SheetError> {
        let text = self.text_column(column)?;
        let not_numeric = || SheetError::NotNumeric {
            column,
            row: self.index,
            value: text.to_string(),
        };
        let value: f64 = text.parse().map_err(|_| not_numeric())?;
        if !value.is_finite() {
            return Err(not_numeric());
        }
        Ok(value.trunc() as i64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sheet(records: &[&[&str]]) -> Sheet {
        let records = records
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        Sheet::new("plus", records)
    }

    #[test]
    fn header_row_is_skipped() {
        let sheet = sheet(&[&["a", "b", "sum"], &["1", "2", "3"], &["4", "5", "9"]]);
        let rows: Vec<_> = sheet.rows_skipping_header().map(Row::index).collect();
        assert_eq!(rows, [1, 2]);
        assert_eq!(sheet.len(), 3);
    }

    #[test]
    fn numeric_cells_are_truncated() {
        let sheet = sheet(&[&["h"], &["2.9"], &["-2.9"], &["7"]]);
        let values: Vec<_> = sheet
            .rows_skipping_header()
            .map(|row| row.int_column(0).unwrap())
            .collect();
        assert_eq!(values, [2, -2, 7]);
    }

    #[test]
    fn blank_and_absent_cells_are_missing() {
        let sheet = sheet(&[&["h", "i"], &["1", "  "]]);
        let row = sheet.rows_skipping_header().next().unwrap();

        let blank = row.int_column(1).unwrap_err();
        assert_eq!(blank.to_string(), "no cell 1 in row 1");
        assert!(matches!(row.int_column(5), Err(SheetError::MissingCell { column: 5, row: 1 })));
    }

    #[test]
    fn text_is_not_numeric() {
        let sheet = sheet(&[&["h"], &["seven"], &["inf"]]);
        for row in sheet.rows_skipping_header() {
            assert!(matches!(row.int_column(0), Err(SheetError::NotNumeric { .. })));
        }
    }
}
