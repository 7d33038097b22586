//! Console harness for producer classes
//!
//! Runs registered producer classes through [`FactoryRunner`] and prints pytest-style results. It is meant to be the
//! `main` of a `harness = false` test target:
//!
//! ```no_run
//! use factory_runner::{Harness, Producer, TestResult, TestSink};
//!
//! #[derive(Default)]
//! struct Smoke;
//!
//! impl Producer for Smoke {
//!     fn produce_tests(&self, sink: &mut TestSink<'_>) -> TestResult {
//!         sink.accept("it works", || Ok(()));
//!         Ok(())
//!     }
//! }
//!
//! fn main() {
//!     Harness::new().producer::<Smoke>().main();
//! }
//! ```
//!
//! ## Design
//!
//! Arguments are parsed with clap into [`HarnessArgs`] and converted into a [`HarnessConfig`]. [`Harness::run`]
//! returns `HarnessResult<RunSummary>` instead of exiting; only [`Harness::main`] calls `process::exit`.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod console;
mod init_failure;

use std::any::Any;
use std::io::{self, Write};
use std::process;
use std::rc::Rc;

use clap::Parser;
use factory_host::{Core, Filter, RunSummary, Runner, TestClass};
use miette::Diagnostic;
use thiserror::Error;

pub use console::ConsoleReporter;
pub use init_failure::ClassInitializationFailed;

use crate::runner::FactoryRunner;
use crate::test::{Producer, producer_class};
use init_failure::UninitializedClass;

/// Exit code for harness runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Errors that end a harness run unsuccessfully.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("{failures} failure(s) in {tests} test(s)")]
    #[diagnostic(code(factory_runner::harness::tests_failed))]
    TestsFailed { failures: usize, tests: usize },

    #[error("failed to write test report: {0}")]
    #[diagnostic(code(factory_runner::harness::io))]
    Io(#[from] io::Error),
}

impl HarnessError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::FAILURE
    }
}

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

// ============================================================================
// Configuration
// ============================================================================

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Print one line per test with its duration
    pub verbose: bool,
    /// Only run tests whose display name contains this text
    pub filter: Option<String>,
    /// Print the test names instead of running them
    pub list_only: bool,
    /// Use ANSI colors
    pub color: bool,
    /// Leave out tests whose display name contains any of these
    pub skip: Vec<String>,
    /// Match `filter` and `skip` against whole names
    pub exact: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            filter: None,
            list_only: false,
            color: true,
            skip: Vec::new(),
            exact: false,
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_list_only(mut self, list_only: bool) -> Self {
        self.list_only = list_only;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_skip(mut self, pattern: impl Into<String>) -> Self {
        self.skip.push(pattern.into());
        self
    }

    pub fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    /// The host filter for this configuration.
    pub fn filter(&self) -> Filter {
        let filter = match &self.filter {
            Some(pattern) => Filter::matching(pattern.clone()),
            None => Filter::all(),
        };
        self.skip
            .iter()
            .fold(filter, |filter, pattern| filter.skipping(pattern.clone()))
            .exact(self.exact)
    }
}

/// Run producer-generated tests
#[derive(Parser, Debug)]
#[command(name = "factory-runner")]
#[command(about = "Run producer-generated tests", long_about = None)]
pub struct HarnessArgs {
    /// Only run tests whose name contains FILTER
    #[arg(value_name = "FILTER")]
    pub filter: Option<String>,

    /// Filter tests by keyword (same as FILTER)
    #[arg(short = 'k', value_name = "EXPR", conflicts_with = "filter")]
    pub keyword: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// List tests without running them
    #[arg(long)]
    pub list: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Skip tests whose name contains PATTERN (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub skip: Vec<String>,

    /// Match FILTER and --skip against whole test names
    #[arg(long)]
    pub exact: bool,

    // Accepted so `cargo test -- <libtest flags>` does not fail on a harness = false target
    #[arg(long, hide = true)]
    pub nocapture: bool,

    #[arg(long = "show-output", hide = true)]
    pub show_output: bool,

    // Produced tests are never ignored, so these select nothing extra
    #[arg(long, hide = true, conflicts_with = "include_ignored")]
    pub ignored: bool,

    #[arg(long = "include-ignored", hide = true)]
    pub include_ignored: bool,

    #[arg(long = "test-threads", hide = true, value_name = "N")]
    pub test_threads: Option<usize>,

    #[arg(short = 'q', long, hide = true)]
    pub quiet: bool,

    #[arg(long, hide = true, value_name = "FORMAT")]
    pub format: Option<String>,
}

impl From<HarnessArgs> for HarnessConfig {
    fn from(args: HarnessArgs) -> Self {
        let mut config = HarnessConfig::new()
            .with_verbose(args.verbose)
            .with_list_only(args.list)
            .with_color(!args.no_color)
            .with_exact(args.exact);
        for pattern in args.skip {
            config = config.with_skip(pattern);
        }
        if let Some(pattern) = args.filter.or(args.keyword) {
            config = config.with_filter(pattern);
        }
        config
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Runs a set of producer classes and reports to the console.
#[derive(Debug, Default)]
pub struct Harness {
    classes: Vec<TestClass>,
    config: HarnessConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Add a class; it is checked and instantiated when the harness runs.
    pub fn register(mut self, class: TestClass) -> Self {
        self.classes.push(class);
        self
    }

    /// Add a default-constructed producer with no hooks.
    pub fn producer<T: Producer + Default + Any>(self) -> Self {
        self.register(producer_class::<T>())
    }

    /// Run every class, reporting to stdout.
    pub fn run(&self) -> HarnessResult<RunSummary> {
        self.run_with(io::stdout())
    }

    /// Run every class, reporting to `out`.
    ///
    /// ## Errors
    ///
    /// - [`HarnessError::TestsFailed`] if any test failed, including classes that could not be initialised
    /// - [`HarnessError::Io`] if the report could not be written
    pub fn run_with<W: Write + 'static>(&self, mut out: W) -> HarnessResult<RunSummary> {
        let runners = self.runners();
        let runners: Vec<&dyn Runner> = runners.iter().map(|runner| &**runner).collect();
        let filter = self.config.filter();

        if self.config.list_only {
            let mut listed = 0;
            for runner in &runners {
                for test in runner.description().children() {
                    if filter.should_run(test) {
                        writeln!(out, "{}: test", test.display_name())?;
                        listed += 1;
                    }
                }
            }
            writeln!(out, "\n{} test(s)", listed)?;
            out.flush()?;
            return Ok(RunSummary::default());
        }

        let reporter = Rc::new(ConsoleReporter::new(out, self.config.verbose, self.config.color));
        let mut core = Core::new();
        core.add_listener(reporter.clone());

        tracing::debug!(classes = runners.len(), filter = %filter.describe(), "starting run");
        let summary = core.run_all(&runners, &filter);

        if let Some(err) = reporter.take_error() {
            return Err(HarnessError::Io(err));
        }
        if summary.was_successful() {
            Ok(summary)
        } else {
            Err(HarnessError::TestsFailed {
                failures: summary.failure_count,
                tests: summary.run_count,
            })
        }
    }

    fn runners(&self) -> Vec<Box<dyn Runner>> {
        self.classes
            .iter()
            .map(|class| -> Box<dyn Runner> {
                match FactoryRunner::new(class.clone()) {
                    Ok(runner) => Box::new(runner),
                    Err(err) => {
                        tracing::error!(class = %class, error = %err, "test class failed to initialise");
                        Box::new(UninitializedClass::new(class, err))
                    }
                }
            })
            .collect()
    }

    /// Entry point for `harness = false` test targets.
    ///
    /// Parses the command line, initialises logging and exits with the run's exit code.
    pub fn main(self) -> ! {
        init_logging();
        let args = HarnessArgs::parse();
        let harness = self.with_config(args.into());

        match harness.run() {
            Ok(_) => process::exit(ExitCode::SUCCESS.0),
            Err(err) => {
                // The report already lists failing tests
                if !matches!(err, HarnessError::TestsFailed { .. }) {
                    eprintln!("{}", err);
                }
                process::exit(err.exit_code().0)
            }
        }
    }
}

/// Initialize structured logging with env-based filter, defaulting to info.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}

// ============================================================================
// Tests
// ============================================================================
