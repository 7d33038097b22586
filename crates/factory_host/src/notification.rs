//! Run notifications: listeners, the notifier that fans out to them, and the run summary.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use miette::Report;

use crate::description::Description;
use crate::error::{MultipleFailures, render_chain};

/// A failure reported against one description.
pub struct Failure {
    description: Description,
    exception: Report,
}

impl Failure {
    pub fn new(description: Description, exception: Report) -> Self {
        Self { description, exception }
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    pub fn exception(&self) -> &Report {
        &self.exception
    }

    /// The top-level failure message.
    pub fn message(&self) -> String {
        self.exception.to_string()
    }

    /// The message followed by its causes.
    pub fn trace(&self) -> String {
        render_chain(&self.exception)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("description", &self.description.display_name())
            .field("message", &self.message())
            .finish()
    }
}

/// Receives run events. Every callback defaults to a no-op.
pub trait RunListener {
    fn test_run_started(&self, _description: &Description) {}

    fn test_run_finished(&self, _summary: &RunSummary) {}

    fn test_started(&self, _description: &Description) {}

    fn test_finished(&self, _description: &Description) {}

    fn test_failure(&self, _failure: &Failure) {}

    fn test_assumption_failure(&self, _failure: &Failure) {}

    fn test_ignored(&self, _description: &Description) {}
}

/// Fans events out to registered listeners, in registration order.
#[derive(Default)]
pub struct RunNotifier {
    listeners: RefCell<Vec<Rc<dyn RunListener>>>,
}

impl RunNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Rc<dyn RunListener>) {
        self.listeners.borrow_mut().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn each(&self, event: impl Fn(&dyn RunListener)) {
        // Snapshot so a listener may register another listener mid-event.
        let listeners = self.listeners.borrow().clone();
        for listener in &listeners {
            event(listener.as_ref());
        }
    }

    pub fn fire_test_run_started(&self, description: &Description) {
        self.each(|l| l.test_run_started(description));
    }

    pub fn fire_test_run_finished(&self, summary: &RunSummary) {
        self.each(|l| l.test_run_finished(summary));
    }

    pub fn fire_test_started(&self, description: &Description) {
        self.each(|l| l.test_started(description));
    }

    pub fn fire_test_finished(&self, description: &Description) {
        self.each(|l| l.test_finished(description));
    }

    pub fn fire_test_failure(&self, failure: &Failure) {
        self.each(|l| l.test_failure(failure));
    }

    pub fn fire_test_assumption_failed(&self, failure: &Failure) {
        self.each(|l| l.test_assumption_failure(failure));
    }

    pub fn fire_test_ignored(&self, description: &Description) {
        self.each(|l| l.test_ignored(description));
    }
}

/// A notifier bound to one description.
pub struct EachTestNotifier<'n> {
    notifier: &'n RunNotifier,
    description: Description,
}

impl<'n> EachTestNotifier<'n> {
    pub fn new(notifier: &'n RunNotifier, description: Description) -> Self {
        Self { notifier, description }
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    pub fn fire_test_started(&self) {
        self.notifier.fire_test_started(&self.description);
    }

    pub fn fire_test_finished(&self) {
        self.notifier.fire_test_finished(&self.description);
    }

    pub fn fire_test_ignored(&self) {
        self.notifier.fire_test_ignored(&self.description);
    }

    /// Report `error` as a failure; collected failures are reported one by one.
    pub fn add_failure(&self, error: Report) {
        match error.downcast::<MultipleFailures>() {
            Ok(multiple) => {
                for failure in multiple.into_failures() {
                    self.add_failure(failure);
                }
            }
            Err(error) => self
                .notifier
                .fire_test_failure(&Failure::new(self.description.clone(), error)),
        }
    }

    pub fn add_failed_assumption(&self, error: Report) {
        self.notifier
            .fire_test_assumption_failed(&Failure::new(self.description.clone(), error));
    }
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_count: usize,
    pub failure_count: usize,
    pub assumption_failure_count: usize,
    pub ignore_count: usize,
    /// `display name: message` for every failure, in report order.
    pub failures: Vec<String>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn was_successful(&self) -> bool {
        self.failure_count == 0
    }
}

/// Listener that accumulates a [`RunSummary`].
pub struct SummaryListener {
    started: Instant,
    run_count: Cell<usize>,
    assumption_failure_count: Cell<usize>,
    ignore_count: Cell<usize>,
    failures: RefCell<Vec<String>>,
}

impl Default for SummaryListener {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            run_count: Cell::new(0),
            assumption_failure_count: Cell::new(0),
            ignore_count: Cell::new(0),
            failures: RefCell::new(Vec::new()),
        }
    }
}

impl SummaryListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> RunSummary {
        let failures = self.failures.borrow().clone();
        RunSummary {
            run_count: self.run_count.get(),
            failure_count: failures.len(),
            assumption_failure_count: self.assumption_failure_count.get(),
            ignore_count: self.ignore_count.get(),
            failures,
            elapsed: self.started.elapsed(),
        }
    }
}

impl RunListener for SummaryListener {
    fn test_finished(&self, _description: &Description) {
        self.run_count.set(self.run_count.get() + 1);
    }

    fn test_failure(&self, failure: &Failure) {
        self.failures
            .borrow_mut()
            .push(format!("{}: {}", failure.description().display_name(), failure.message()));
    }

    fn test_assumption_failure(&self, _failure: &Failure) {
        self.assumption_failure_count
            .set(self.assumption_failure_count.get() + 1);
    }

    fn test_ignored(&self, _description: &Description) {
        self.ignore_count.set(self.ignore_count.get() + 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use miette::miette;

    use super::*;
    use crate::error::{AssumptionViolated, InitializationError};

    #[test]
    fn test_summary_counts_each_kind_of_event() {
        let summary = Rc::new(SummaryListener::new());
        let notifier = RunNotifier::new();
        notifier.add_listener(summary.clone());

        let passing = EachTestNotifier::new(&notifier, Description::test_named("demo::S", "pass"));
        passing.fire_test_started();
        passing.fire_test_finished();

        let failing = EachTestNotifier::new(&notifier, Description::test_named("demo::S", "fail"));
        failing.fire_test_started();
        failing.add_failure(miette!("boom"));
        failing.fire_test_finished();

        let skipped = EachTestNotifier::new(&notifier, Description::test_named("demo::S", "skip"));
        skipped.fire_test_started();
        skipped.add_failed_assumption(Report::new(AssumptionViolated::new("later")));
        skipped.fire_test_finished();

        let result = summary.summary();
        assert_eq!(result.run_count, 3);
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.assumption_failure_count, 1);
        assert_eq!(result.ignore_count, 0);
        assert_eq!(result.failures, ["fail(demo::S): boom"]);
        assert!(!result.was_successful());
    }

    #[test]
    fn test_multiple_failures_are_reported_individually() {
        let summary = Rc::new(SummaryListener::new());
        let notifier = RunNotifier::new();
        notifier.add_listener(summary.clone());

        let each = EachTestNotifier::new(&notifier, Description::test_named("demo::S", "both"));
        let collected = MultipleFailures::assert_empty(vec![miette!("body"), miette!("teardown")]).unwrap_err();
        each.add_failure(collected);

        assert_eq!(
            summary.summary().failures,
            ["both(demo::S): body", "both(demo::S): teardown"]
        );
    }

    #[test]
    fn test_failure_trace_includes_causes() {
        let error = InitializationError::Instantiation {
            class: "demo::Broken".to_string(),
            cause: miette!("database unreachable"),
        };
        let failure = Failure::new(Description::suite_named("demo::Broken"), Report::new(error));
        assert_eq!(failure.message(), "failed to instantiate demo::Broken");
        insta::assert_snapshot!(failure.trace(), @r"
        failed to instantiate demo::Broken
          caused by: database unreachable
        ");
    }
}
