//! Shared producers for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use factory_runner::{Producer, SheetError, SpreadsheetDriven, TestResult, TestSink, Workbook};

/// Directory holding the arithmetic workbook, one CSV file per sheet.
pub fn arithmetic_workbook() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/arithmetic")
}

/// Checks addition and subtraction tables: `plus` has columns a, b, sum and `minus` has a, b, difference.
pub struct Arithmetic {
    workbook: PathBuf,
}

impl Arithmetic {
    pub fn at(workbook: impl Into<PathBuf>) -> Self {
        Self {
            workbook: workbook.into(),
        }
    }
}

impl Default for Arithmetic {
    fn default() -> Self {
        Self::at(arithmetic_workbook())
    }
}

impl SpreadsheetDriven for Arithmetic {
    fn load_workbook(&self) -> Result<Workbook, SheetError> {
        Workbook::open(&self.workbook)
    }

    fn produce_from(&self, workbook: &Workbook, sink: &mut TestSink<'_>) -> TestResult {
        for row in workbook.sheet("plus")?.rows_skipping_header() {
            let (a, b, sum) = (row.int_column(0)?, row.int_column(1)?, row.int_column(2)?);
            let name = format!("Addition: {} + {} = {}", a, b, sum);
            sink.accept(name.clone(), move || {
                assert_eq!(a + b, sum, "{}", name);
                Ok(())
            });
        }

        for row in workbook.sheet("minus")?.rows_skipping_header() {
            let (a, b, difference) = (row.int_column(0)?, row.int_column(1)?, row.int_column(2)?);
            let name = format!("Subtraction: {} - {} = {}", a, b, difference);
            sink.accept(name.clone(), move || {
                assert_eq!(a - b, difference, "{}", name);
                Ok(())
            });
        }
        Ok(())
    }
}

impl Producer for Arithmetic {
    fn produce_tests(&self, sink: &mut TestSink<'_>) -> TestResult {
        self.produce_from_workbook(sink)
    }
}
