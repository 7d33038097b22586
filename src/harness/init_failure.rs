//! Stand-in runner for a class that could not be initialised.
//!
//! The class is reported as a single failing test so the problem shows up in the normal pass/fail output instead of
//! aborting the whole run.

use std::fmt;
use std::sync::Arc;

use factory_host::{Description, EachTestNotifier, Filter, InitializationError, RunNotifier, Runner, TestClass};
use miette::{Diagnostic, Report};
use thiserror::Error;

use crate::describe::INITIALIZATION_ERROR_NAME;

/// The failure reported for a class whose runner could not be created.
#[derive(Debug, Clone, Error)]
#[error(transparent)]
pub struct ClassInitializationFailed {
    cause: Arc<InitializationError>,
}

impl ClassInitializationFailed {
    pub fn cause(&self) -> &InitializationError {
        &self.cause
    }
}

impl Diagnostic for ClassInitializationFailed {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.cause.code()
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        self.cause.diagnostic_source()
    }
}

pub(crate) struct UninitializedClass {
    test: Description,
    suite: Description,
    cause: Arc<InitializationError>,
}

impl UninitializedClass {
    pub(crate) fn new(class: &TestClass, cause: InitializationError) -> Self {
        let test = Description::test(class, INITIALIZATION_ERROR_NAME);
        let mut suite = Description::suite(class);
        suite.add_child(test.clone());
        Self {
            test,
            suite,
            cause: Arc::new(cause),
        }
    }
}

impl Runner for UninitializedClass {
    fn description(&self) -> Description {
        self.suite.clone()
    }

    fn run_filtered(&self, notifier: &RunNotifier, filter: &Filter) {
        if !filter.should_run(&self.test) {
            return;
        }
        let each = EachTestNotifier::new(notifier, self.test.clone());
        each.fire_test_started();
        each.add_failure(Report::new(ClassInitializationFailed {
            cause: Arc::clone(&self.cause),
        }));
        each.fire_test_finished();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use factory_host::{Core, error::render_chain};
    use miette::miette;

    use super::*;

    struct Unbuildable;

    #[test]
    fn test_reported_as_one_failing_test() {
        let class = TestClass::builder::<Unbuildable>().build();
        let cause = InitializationError::Instantiation {
            class: class.name().to_string(),
            cause: miette!("config file missing"),
        };
        let runner = UninitializedClass::new(&class, cause);

        assert_eq!(runner.description().test_count(), 1);
        let summary = Core::new().run(&runner);
        assert_eq!(summary.run_count, 1);
        assert_eq!(summary.failure_count, 1);
        assert!(summary.failures[0].starts_with("initialization-error("));
    }

    #[test]
    fn test_failure_keeps_the_cause_chain() {
        let failed = ClassInitializationFailed {
            cause: Arc::new(InitializationError::Instantiation {
                class: "demo::Unbuildable".to_string(),
                cause: miette!("config file missing"),
            }),
        };
        assert_eq!(
            render_chain(&Report::new(failed)),
            "failed to instantiate demo::Unbuildable\n  caused by: config file missing"
        );
    }

    #[test]
    fn test_failure_exposes_the_cause_as_standard_source() {
        let failed = Report::new(ClassInitializationFailed {
            cause: Arc::new(InitializationError::Instantiation {
                class: "demo::Unbuildable".to_string(),
                cause: miette!("config file missing"),
            }),
        });
        let chain: Vec<String> = failed.chain().map(ToString::to_string).collect();
        assert_eq!(chain, ["failed to instantiate demo::Unbuildable", "config file missing"]);
    }
}
