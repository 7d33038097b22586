//! The runner contract the host drives, and the host's own entry point.
//!
//! A [`ParentRunner`] exposes a list of children, describes each one and runs one child at a time. Everything else
//! (class-level hooks, filtering, suite descriptions) is provided on top through the object-safe [`Runner`] trait.

use std::rc::Rc;

use crate::class::TestClass;
use crate::description::Description;
use crate::error::{TestResult, catch_panic, is_assumption_violation};
use crate::notification::{EachTestNotifier, RunListener, RunNotifier, RunSummary, SummaryListener};
use crate::statement::{BoxStatement, RunAfters, RunBefores, Statement};

/// Runner over a list of children of one test class.
pub trait ParentRunner {
    type Child;

    fn test_class(&self) -> &TestClass;

    /// The children, in execution order. Must return the same list on every call.
    fn children(&self) -> &[Self::Child];

    fn describe_child(&self, child: &Self::Child) -> Description;

    /// Run one child, reporting its outcome to `notifier`.
    fn run_child(&self, child: &Self::Child, notifier: &RunNotifier);
}

/// Object-safe view of a runner.
pub trait Runner {
    /// Suite description with one child per test.
    fn description(&self) -> Description;

    fn run_filtered(&self, notifier: &RunNotifier, filter: &Filter);

    fn run(&self, notifier: &RunNotifier) {
        self.run_filtered(notifier, &Filter::all());
    }
}

impl<P: ParentRunner> Runner for P {
    fn description(&self) -> Description {
        let mut suite = Description::suite(self.test_class());
        for child in self.children() {
            suite.add_child(self.describe_child(child));
        }
        suite
    }

    fn run_filtered(&self, notifier: &RunNotifier, filter: &Filter) {
        let selected: Vec<&P::Child> = self
            .children()
            .iter()
            .filter(|child| filter.should_run(&self.describe_child(child)))
            .collect();
        if selected.is_empty() {
            return;
        }

        let class = self.test_class();
        let lifecycle = class.lifecycle();
        let run_children = move || -> TestResult {
            for child in &selected {
                self.run_child(child, notifier);
            }
            Ok(())
        };
        let statement: BoxStatement<'_> = Box::new(run_children);
        let statement: BoxStatement<'_> = Box::new(RunBefores::new(statement, lifecycle.before_class(), &()));
        let statement = RunAfters::new(statement, lifecycle.after_class(), &());

        let each = EachTestNotifier::new(notifier, Description::suite(class));
        match catch_panic(|| statement.evaluate()) {
            Ok(()) => {}
            Err(err) if is_assumption_violation(&err) => each.add_failed_assumption(err),
            Err(err) => each.add_failure(err),
        }
    }
}

/// Selects which tests run.
///
/// A test runs when it matches the pattern (if any) and none of the skip patterns. Patterns are substrings of the
/// display name; in exact mode they must equal the display name or the method name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pattern: Option<String>,
    skip: Vec<String>,
    exact: bool,
}

impl Filter {
    /// Runs everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Runs tests whose display name contains `pattern`.
    pub fn matching(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// Also leave out tests matching `pattern`.
    pub fn skipping(mut self, pattern: impl Into<String>) -> Self {
        self.skip.push(pattern.into());
        self
    }

    /// Require whole-name matches instead of substrings.
    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    fn matches(&self, description: &Description, pattern: &str) -> bool {
        if self.exact {
            description.display_name() == pattern || description.method_name() == Some(pattern)
        } else {
            description.display_name().contains(pattern)
        }
    }

    pub fn should_run(&self, description: &Description) -> bool {
        if !description.is_test() {
            return description.children().iter().any(|child| self.should_run(child));
        }
        let selected = match &self.pattern {
            None => true,
            Some(pattern) => self.matches(description, pattern),
        };
        selected && !self.skip.iter().any(|pattern| self.matches(description, pattern))
    }

    pub fn describe(&self) -> String {
        let mut described = match &self.pattern {
            None => "all tests".to_string(),
            Some(pattern) if self.exact => format!("tests named `{}`", pattern),
            Some(pattern) => format!("tests matching `{}`", pattern),
        };
        if !self.skip.is_empty() {
            let skipped: Vec<String> = self.skip.iter().map(|pattern| format!("`{}`", pattern)).collect();
            described.push_str(&format!(" except {}", skipped.join(", ")));
        }
        described
    }
}

/// Host entry point: runs runners and aggregates a summary.
#[derive(Default)]
pub struct Core {
    listeners: Vec<Rc<dyn RunListener>>,
}

impl Core {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Rc<dyn RunListener>) {
        self.listeners.push(listener);
    }

    pub fn run(&self, runner: &dyn Runner) -> RunSummary {
        self.run_all(&[runner], &Filter::all())
    }

    pub fn run_all(&self, runners: &[&dyn Runner], filter: &Filter) -> RunSummary {
        let summary = Rc::new(SummaryListener::new());
        let notifier = RunNotifier::new();
        notifier.add_listener(summary.clone());
        for listener in &self.listeners {
            notifier.add_listener(Rc::clone(listener));
        }

        let mut root = Description::suite_named("all");
        for runner in runners {
            root.add_child(runner.description());
        }

        notifier.fire_test_run_started(&root);
        for runner in runners {
            runner.run_filtered(&notifier, filter);
        }
        let result = summary.summary();
        notifier.fire_test_run_finished(&result);
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;

    use miette::miette;

    use super::*;

    thread_local! {
        static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn log(event: &str) {
        EVENTS.with(|events| events.borrow_mut().push(event.to_string()));
    }

    fn take_events() -> Vec<String> {
        EVENTS.with(|events| events.borrow_mut().drain(..).collect())
    }

    struct Listed;

    struct ListRunner {
        class: TestClass,
        children: Vec<(&'static str, bool)>,
    }

    impl ListRunner {
        fn new(class: TestClass) -> Self {
            Self {
                class,
                children: vec![("alpha", true), ("beta", false), ("gamma", true)],
            }
        }
    }

    impl ParentRunner for ListRunner {
        type Child = (&'static str, bool);

        fn test_class(&self) -> &TestClass {
            &self.class
        }

        fn children(&self) -> &[Self::Child] {
            &self.children
        }

        fn describe_child(&self, child: &Self::Child) -> Description {
            Description::test(&self.class, child.0)
        }

        fn run_child(&self, child: &Self::Child, notifier: &RunNotifier) {
            let each = EachTestNotifier::new(notifier, self.describe_child(child));
            each.fire_test_started();
            log(child.0);
            if !child.1 {
                each.add_failure(miette!("{} failed", child.0));
            }
            each.fire_test_finished();
        }
    }

    fn class_with_hooks(before: fn() -> TestResult) -> TestClass {
        TestClass::builder::<Listed>()
            .before_class("open", before)
            .after_class("close", || {
                log("close");
                Ok(())
            })
            .build()
    }

    #[test]
    fn test_children_run_in_order_inside_class_hooks() {
        let runner = ListRunner::new(class_with_hooks(|| {
            log("open");
            Ok(())
        }));
        take_events();

        let summary = Core::new().run(&runner);

        assert_eq!(take_events(), ["open", "alpha", "beta", "gamma", "close"]);
        assert_eq!(summary.run_count, 3);
        assert_eq!(summary.failure_count, 1);
    }

    #[test]
    fn test_failing_before_class_skips_children_but_runs_after_class() {
        let runner = ListRunner::new(class_with_hooks(|| Err(miette!("cannot open"))));
        take_events();

        let summary = Core::new().run(&runner);

        assert_eq!(take_events(), ["close"]);
        assert_eq!(summary.run_count, 0);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].ends_with("cannot open"));
    }

    #[test]
    fn test_filter_selects_by_display_name() {
        let runner = ListRunner::new(TestClass::builder::<Listed>().build());
        take_events();

        let summary = Core::new().run_all(&[&runner], &Filter::matching("gam"));

        assert_eq!(take_events(), ["gamma"]);
        assert_eq!(summary.run_count, 1);
        assert!(summary.was_successful());
    }

    #[test]
    fn test_description_lists_children() {
        let runner = ListRunner::new(TestClass::builder::<Listed>().build());
        let description = runner.description();
        assert_eq!(description.test_count(), 3);
        assert_eq!(description.children()[1].method_name(), Some("beta"));
        assert!(Filter::matching("beta").should_run(&description));
        assert!(!Filter::matching("delta").should_run(&description));
    }

    #[test]
    fn test_filter_skip_and_exact() {
        let alpha = Description::test_named("demo::Listed", "alpha");
        let alphabet = Description::test_named("demo::Listed", "alphabet");

        let skipping = Filter::all().skipping("bet");
        assert!(skipping.should_run(&alpha));
        assert!(!skipping.should_run(&alphabet));

        let exact = Filter::matching("alpha").exact(true);
        assert!(exact.should_run(&alpha));
        assert!(!exact.should_run(&alphabet));
        assert!(Filter::matching("alphabet(demo::Listed)").exact(true).should_run(&alphabet));

        let exact_skip = Filter::all().skipping("alpha").exact(true);
        assert!(!exact_skip.should_run(&alpha));
        assert!(exact_skip.should_run(&alphabet));
        assert_eq!(
            Filter::matching("alpha").skipping("beta").describe(),
            "tests matching `alpha` except `beta`"
        );
    }
}
