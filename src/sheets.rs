//! Producers driven by a workbook of tabular data.

use factory_host::TestResult;
use factory_sheets::{SheetError, Workbook};
use miette::WrapErr;

use crate::test::TestSink;

/// A producer whose tests come from the rows of a workbook.
///
/// Implementors load their workbook and turn rows into tests; [`Producer::produce_tests`](crate::Producer) usually
/// just forwards to [`SpreadsheetDriven::produce_from_workbook`].
pub trait SpreadsheetDriven {
    fn load_workbook(&self) -> Result<Workbook, SheetError>;

    fn produce_from(&self, workbook: &Workbook, sink: &mut TestSink<'_>) -> TestResult;

    /// Load the workbook and produce from it. A load failure fails production as a whole.
    fn produce_from_workbook(&self, sink: &mut TestSink<'_>) -> TestResult {
        let workbook = self
            .load_workbook()
            .wrap_err("failed to load spreadsheet for test")?;
        self.produce_from(&workbook, sink)
    }
}
