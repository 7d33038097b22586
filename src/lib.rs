#![forbid(unsafe_code)]
//! Dynamically produced tests, run as first-class tests of the host harness.
//!
//! A [`Producer`] generates named test closures at run time, from a data table, a directory listing or anything
//! else. [`FactoryRunner`] turns them into children the host can enumerate, describe, wrap with the producer class's
//! hooks and rules, execute and report, exactly like statically declared tests.
//!
//! ```
//! use factory_runner::{Core, FactoryRunner, Producer, TestResult, TestSink, producer_class};
//!
//! #[derive(Default)]
//! struct Squares;
//!
//! impl Producer for Squares {
//!     fn produce_tests(&self, sink: &mut TestSink<'_>) -> TestResult {
//!         for n in 1..=3_i64 {
//!             sink.accept(format!("square of {}", n), move || {
//!                 assert_eq!(n * n, n.pow(2));
//!                 Ok(())
//!             });
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let runner = FactoryRunner::new(producer_class::<Squares>()).unwrap();
//! let summary = Core::new().run(&runner);
//! assert_eq!(summary.run_count, 3);
//! assert!(summary.was_successful());
//! ```
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `harness` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **User test code**: panics in test bodies, hooks, rules and producers are expected (`assert!` is how most tests
//!   fail). They are caught at the invocation boundary and reported as failures of the owning test.

pub mod describe;
pub mod harness;
pub mod lifecycle;
pub mod runner;
pub mod sheets;

pub use describe::{DescriptionMapper, INITIALIZATION_ERROR_NAME, PRODUCTION_FAILURE_NAME};
pub use harness::{ExitCode, Harness, HarnessArgs, HarnessConfig, HarnessError, HarnessResult};
pub use lifecycle::{HookLayer, LifecycleCache, Scope, StageKind, WrapperChain};
pub use runner::{DescribedTest, FactoryRunner, ProductionFailed};
pub use sheets::SpreadsheetDriven;
pub use test::{AsAny, GeneratedTest, Producer, ProducerCapability, ProducerClassExt, TestSink, producer_class};

pub use factory_host::{
    AssumptionViolated, ClassLifecycle, Core, Description, ExternalResource, Filter, InitializationError,
    ParentRunner, RunListener, RunNotifier, RunSummary, Runner, TemporaryFolder, TestClass, TestName, TestResult,
    TestRule, assume, fail,
};
pub use factory_sheets::{Row, Sheet, SheetError, Workbook};
