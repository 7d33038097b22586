//! Failure taxonomy shared by the host and every runner built on it.
//!
//! Test code reports failures as [`miette::Report`]s. Two failures are distinguished by type:
//!
//! - [`AssumptionViolated`]: the test was inconclusive and counts as skipped, not failed.
//! - [`MultipleFailures`]: several independent failures (body plus teardown, for instance) that are reported one by
//!   one.
//!
//! Panics are part of the contract too: an `assert!` in a test body is an ordinary failure, and a panic whose payload
//! is an [`AssumptionViolated`] stays an assumption violation. [`catch_panic`] performs that translation.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use miette::{Diagnostic, Report};
use thiserror::Error;

/// Outcome of evaluating any piece of test code.
pub type TestResult<T = ()> = Result<T, Report>;

/// Inconclusive outcome: the test's preconditions do not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("assumption violated: {message}")]
#[diagnostic(code(factory_host::assumption_violated))]
pub struct AssumptionViolated {
    message: String,
}

impl AssumptionViolated {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Abort the current test as inconclusive from any call depth.
    ///
    /// The panic payload is recognised by [`catch_panic`] and reported as an assumption failure.
    #[cold]
    #[track_caller]
    pub fn raise(self) -> ! {
        panic::panic_any(self)
    }
}

/// Explicit failure raised through [`fail`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(factory_host::assertion_failed))]
pub struct AssertionFailed {
    message: String,
}

/// A panic caught while evaluating test code.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(factory_host::panicked))]
pub struct TestPanicked {
    message: String,
}

impl TestPanicked {
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Several failures collected while evaluating one statement.
#[derive(Debug, Error, Diagnostic)]
#[error("{} failures occurred", .failures.len())]
#[diagnostic(code(factory_host::multiple_failures))]
pub struct MultipleFailures {
    failures: Vec<Report>,
}

impl MultipleFailures {
    /// Collapse collected failures: none is a pass, one is returned as is, more are wrapped.
    pub fn assert_empty(mut failures: Vec<Report>) -> TestResult {
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(Report::new(MultipleFailures { failures })),
        }
    }

    pub fn failures(&self) -> &[Report] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<Report> {
        self.failures
    }
}

/// Configuration error: the class cannot be run at all.
///
/// Raised before any child exists and surfaced through the host's initialisation-error channel.
#[derive(Debug)]
pub enum InitializationError {
    MissingCapability { class: String, capability: &'static str },
    NoConstructor { class: String },
    Instantiation { class: String, cause: Report },
}

impl fmt::Display for InitializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCapability { class, capability } => write!(f, "{} must implement {}", class, capability),
            Self::NoConstructor { class } => write!(f, "{} has no registered constructor", class),
            Self::Instantiation { class, .. } => write!(f, "failed to instantiate {}", class),
        }
    }
}

// `Report` is not a `std::error::Error`, so thiserror cannot mark it as the source.
impl std::error::Error for InitializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Instantiation { cause, .. } => Some(report_as_error(cause)),
            _ => None,
        }
    }
}

impl Diagnostic for InitializationError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self {
            Self::MissingCapability { .. } => "factory_host::init::missing_capability",
            Self::NoConstructor { .. } => "factory_host::init::no_constructor",
            Self::Instantiation { .. } => "factory_host::init::instantiation",
        };
        Some(Box::new(code))
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        match self {
            Self::Instantiation { cause, .. } => Some(&**cause),
            _ => None,
        }
    }
}

/// Skip the current test unless `condition` holds.
///
/// Meant for `?` inside a test body: `assume(db_available(), "database is down")?;`
pub fn assume(condition: bool, message: impl Into<String>) -> Result<(), AssumptionViolated> {
    if condition {
        Ok(())
    } else {
        Err(AssumptionViolated::new(message))
    }
}

/// Fail the current test with `message`.
pub fn fail<T>(message: impl Into<String>) -> TestResult<T> {
    Err(Report::new(AssertionFailed {
        message: message.into(),
    }))
}

/// Whether `report` signals an inconclusive test rather than a failure.
pub fn is_assumption_violation(report: &Report) -> bool {
    report.downcast_ref::<AssumptionViolated>().is_some()
}

/// Evaluate `f`, turning a panic into a failure report.
pub fn catch_panic<T>(f: impl FnOnce() -> TestResult<T>) -> TestResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(report_from_panic(payload)),
    }
}

/// Convert a panic payload into a report, preserving assumption violations.
pub fn report_from_panic(payload: Box<dyn Any + Send>) -> Report {
    let payload = match payload.downcast::<AssumptionViolated>() {
        Ok(assumption) => return Report::new(*assumption),
        Err(payload) => payload,
    };

    let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test panicked with a non-string payload".to_string()
    };

    Report::new(TestPanicked { message })
}

/// `report` as a standard error, for `Error::source` implementations that wrap a report.
pub fn report_as_error(report: &Report) -> &(dyn std::error::Error + Send + Sync + 'static) {
    report.as_ref()
}

/// Render a report and its diagnostic causes, one per line.
pub fn render_chain(report: &Report) -> String {
    let mut rendered = report.to_string();
    let mut next = report.diagnostic_source();
    while let Some(cause) = next {
        rendered.push_str("\n  caused by: ");
        rendered.push_str(&cause.to_string());
        next = cause.diagnostic_source();
    }
    rendered
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn assume_passes_when_condition_holds() {
        assert!(assume(true, "unused").is_ok());
        let err = assume(false, "no network").unwrap_err();
        assert_eq!(err.message(), "no network");
        assert_eq!(err.to_string(), "assumption violated: no network");
    }

    #[test]
    fn assumption_survives_conversion_to_report() {
        let result: TestResult = (|| {
            assume(false, "skip me")?;
            Ok(())
        })();
        assert!(is_assumption_violation(&result.unwrap_err()));
    }

    #[test]
    fn fail_is_not_an_assumption() {
        let report = fail::<()>("boom").unwrap_err();
        assert_eq!(report.to_string(), "boom");
        assert!(!is_assumption_violation(&report));
    }

    #[test]
    fn catch_panic_reports_string_payloads() {
        let report = catch_panic(|| -> TestResult { panic!("left != right") }).unwrap_err();
        assert_eq!(report.downcast_ref::<TestPanicked>().unwrap().message(), "left != right");

        let report = catch_panic(|| -> TestResult { panic!("{} apples", 3) }).unwrap_err();
        assert_eq!(report.to_string(), "3 apples");
    }

    #[test]
    fn catch_panic_keeps_raised_assumptions() {
        let report = catch_panic(|| -> TestResult { AssumptionViolated::new("not today").raise() }).unwrap_err();
        assert!(is_assumption_violation(&report));
    }

    #[test]
    fn multiple_failures_collapse_by_count() {
        assert!(MultipleFailures::assert_empty(Vec::new()).is_ok());

        let single = MultipleFailures::assert_empty(vec![miette::miette!("only")]).unwrap_err();
        assert_eq!(single.to_string(), "only");

        let many = MultipleFailures::assert_empty(vec![miette::miette!("a"), miette::miette!("b")]).unwrap_err();
        assert_eq!(many.to_string(), "2 failures occurred");
        assert_eq!(many.downcast_ref::<MultipleFailures>().unwrap().failures().len(), 2);
    }

    #[test]
    fn render_chain_follows_diagnostic_sources() {
        let error = InitializationError::Instantiation {
            class: "demo::Broken".to_string(),
            cause: miette::miette!("constructor exploded"),
        };
        let rendered = render_chain(&Report::new(error));
        assert_eq!(rendered, "failed to instantiate demo::Broken\n  caused by: constructor exploded");
    }

    #[test]
    fn instantiation_cause_is_the_standard_source() {
        let report = Report::new(InitializationError::Instantiation {
            class: "demo::Broken".to_string(),
            cause: miette::miette!("constructor exploded"),
        });
        let chain: Vec<String> = report.chain().map(ToString::to_string).collect();
        assert_eq!(chain, ["failed to instantiate demo::Broken", "constructor exploded"]);

        let missing = InitializationError::NoConstructor {
            class: "demo::Broken".to_string(),
        };
        assert!(std::error::Error::source(&missing).is_none());
    }
}
