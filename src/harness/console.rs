//! Console reporter (pytest-style)
//!
//! Prints one status mark per test (a full line in verbose mode), a FAILURES section with each failure's cause
//! chain, and a one-line summary.

use std::cell::RefCell;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use factory_host::{Description, Failure, RunListener, RunSummary};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const BOLD_RED: &str = "\x1b[1;31m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Passed,
    Failed,
    Skipped,
}

struct Current {
    unique_id: String,
    started: Instant,
    outcome: Outcome,
    reason: Option<String>,
}

struct State<W> {
    out: W,
    current: Option<Current>,
    failures: Vec<(String, String)>,
    passed: usize,
    failed: usize,
    skipped: usize,
    errors: usize,
    error: Option<io::Error>,
}

/// Default console reporter
pub struct ConsoleReporter<W: Write> {
    verbose: bool,
    color: bool,
    state: RefCell<State<W>>,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool, color: bool) -> Self {
        Self {
            verbose,
            color,
            state: RefCell::new(State {
                out,
                current: None,
                failures: Vec::new(),
                passed: 0,
                failed: 0,
                skipped: 0,
                errors: 0,
                error: None,
            }),
        }
    }

    /// The first write error, if any; listener callbacks cannot return one.
    pub fn take_error(&self) -> Option<io::Error> {
        self.state.borrow_mut().error.take()
    }

    pub fn into_inner(self) -> W {
        self.state.into_inner().out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn write(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        if state.error.is_some() {
            return;
        }
        if let Err(err) = state.out.write_all(text.as_bytes()) {
            state.error = Some(err);
        }
    }

    fn status(&self, outcome: Outcome, elapsed: Duration, reason: Option<&str>) -> String {
        if !self.verbose {
            return match outcome {
                Outcome::Passed => self.paint(GREEN, "."),
                Outcome::Failed => self.paint(RED, "F"),
                Outcome::Skipped => self.paint(YELLOW, "s"),
            };
        }
        match outcome {
            Outcome::Passed => format!("{} ({:.0}ms)\n", self.paint(GREEN, "PASSED"), elapsed.as_millis()),
            Outcome::Failed => format!("{} ({:.0}ms)\n", self.paint(RED, "FAILED"), elapsed.as_millis()),
            Outcome::Skipped => match reason {
                Some(reason) => format!("{} ({})\n", self.paint(YELLOW, "SKIPPED"), reason),
                None => format!("{}\n", self.paint(YELLOW, "SKIPPED")),
            },
        }
    }

    /// Record `outcome` for the running test; false when `description` is not the running test.
    fn mark(&self, description: &Description, outcome: Outcome, reason: Option<String>) -> bool {
        let mut state = self.state.borrow_mut();
        match state.current.as_mut() {
            Some(current) if current.unique_id == description.unique_id() => {
                if current.outcome == Outcome::Passed {
                    current.outcome = outcome;
                    current.reason = reason;
                }
                true
            }
            _ => false,
        }
    }
}

impl<W: Write> RunListener for ConsoleReporter<W> {
    fn test_run_started(&self, description: &Description) {
        let count = description.test_count();
        self.write(&format!(
            "{}\ncollected {} item(s)\n\n",
            self.paint(BOLD, "=================== test session starts ==================="),
            count
        ));
    }

    fn test_started(&self, description: &Description) {
        if self.verbose {
            self.write(&format!("{} ... ", description.display_name()));
        }
        self.state.borrow_mut().current = Some(Current {
            unique_id: description.unique_id().to_string(),
            started: Instant::now(),
            outcome: Outcome::Passed,
            reason: None,
        });
    }

    fn test_failure(&self, failure: &Failure) {
        let in_test = self.mark(failure.description(), Outcome::Failed, None);
        let mut state = self.state.borrow_mut();
        if !in_test {
            state.errors += 1;
        }
        state
            .failures
            .push((failure.description().display_name().to_string(), failure.trace()));
    }

    fn test_assumption_failure(&self, failure: &Failure) {
        self.mark(failure.description(), Outcome::Skipped, Some(failure.message()));
    }

    fn test_finished(&self, description: &Description) {
        let current = self.state.borrow_mut().current.take();
        let Some(current) = current.filter(|current| current.unique_id == description.unique_id()) else {
            return;
        };
        {
            let mut state = self.state.borrow_mut();
            match current.outcome {
                Outcome::Passed => state.passed += 1,
                Outcome::Failed => state.failed += 1,
                Outcome::Skipped => state.skipped += 1,
            }
        }
        let status = self.status(current.outcome, current.started.elapsed(), current.reason.as_deref());
        self.write(&status);
    }

    fn test_run_finished(&self, summary: &RunSummary) {
        let failures = std::mem::take(&mut self.state.borrow_mut().failures);
        if !self.verbose {
            self.write("\n");
        }

        if !failures.is_empty() {
            self.write(&format!(
                "\n{}\n",
                self.paint(BOLD_RED, "=================== FAILURES ===================")
            ));
            for (name, trace) in &failures {
                self.write(&format!("\n{}\n\n", self.paint(BOLD, &format!("___________ {} ___________", name))));
                for line in trace.lines() {
                    self.write(&format!("    {}\n", line));
                }
            }
        }

        let (passed, failed, skipped, errors) = {
            let state = self.state.borrow();
            (state.passed, state.failed, state.skipped, state.errors)
        };
        let mut parts = Vec::new();
        if passed > 0 {
            parts.push(format!("{} passed", passed));
        }
        if failed > 0 {
            parts.push(format!("{} failed", failed));
        }
        if skipped > 0 {
            parts.push(format!("{} skipped", skipped));
        }
        if errors > 0 {
            parts.push(format!("{} error(s)", errors));
        }
        if parts.is_empty() {
            parts.push("no tests ran".to_string());
        }

        let color = if summary.was_successful() { BOLD_GREEN } else { BOLD_RED };
        let line = format!(
            "=================== {} in {:.2}s ===================",
            parts.join(", "),
            summary.elapsed.as_secs_f64()
        );
        self.write(&format!("\n{}\n", self.paint(color, &line)));

        let mut state = self.state.borrow_mut();
        if state.error.is_none() {
            if let Err(err) = state.out.flush() {
                state.error = Some(err);
            }
        }
    }
}
