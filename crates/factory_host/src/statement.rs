//! Statements: composable units of deferred test execution.
//!
//! A test's execution is a chain of statements built outside-in: rules wrap afters, afters wrap befores, befores wrap
//! the body. Evaluating the outermost statement runs the whole chain.

use std::any::Any;

use crate::class::HookMember;
use crate::description::Description;
use crate::error::{MultipleFailures, TestResult, catch_panic};
use crate::rules::TestRule;

/// Something that can be evaluated and may fail.
pub trait Statement {
    fn evaluate(&self) -> TestResult;
}

pub type BoxStatement<'a> = Box<dyn Statement + 'a>;

impl<F> Statement for F
where
    F: Fn() -> TestResult,
{
    fn evaluate(&self) -> TestResult {
        self()
    }
}

/// The innermost statement: run `body`, reporting a panic as a failure.
pub fn invoke<'a>(body: impl Fn() -> TestResult + 'a) -> BoxStatement<'a> {
    Box::new(move || catch_panic(&body))
}

/// Runs setup hooks before `next`; the first failing hook stops the chain.
pub struct RunBefores<'a> {
    next: BoxStatement<'a>,
    befores: &'a [HookMember],
    target: &'a dyn Any,
}

impl<'a> RunBefores<'a> {
    pub fn new(next: BoxStatement<'a>, befores: &'a [HookMember], target: &'a dyn Any) -> Self {
        Self { next, befores, target }
    }
}

impl Statement for RunBefores<'_> {
    fn evaluate(&self) -> TestResult {
        for before in self.befores {
            before.invoke(self.target)?;
        }
        self.next.evaluate()
    }
}

/// Runs teardown hooks after `next`, whatever its outcome.
///
/// Every hook runs; all failures (body included) are collected and reported together.
pub struct RunAfters<'a> {
    next: BoxStatement<'a>,
    afters: &'a [HookMember],
    target: &'a dyn Any,
}

impl<'a> RunAfters<'a> {
    pub fn new(next: BoxStatement<'a>, afters: &'a [HookMember], target: &'a dyn Any) -> Self {
        Self { next, afters, target }
    }
}

impl Statement for RunAfters<'_> {
    fn evaluate(&self) -> TestResult {
        let mut failures = Vec::new();
        if let Err(err) = catch_panic(|| self.next.evaluate()) {
            failures.push(err);
        }
        for after in self.afters {
            if let Err(err) = after.invoke(self.target) {
                failures.push(err);
            }
        }
        MultipleFailures::assert_empty(failures)
    }
}

/// Applies rules in declaration order; the last declared rule ends up outermost.
pub struct RunRules<'a> {
    statement: BoxStatement<'a>,
}

impl<'a> RunRules<'a> {
    pub fn new(base: BoxStatement<'a>, rules: Vec<&'a dyn TestRule>, description: &'a Description) -> Self {
        let statement = rules
            .into_iter()
            .fold(base, |statement, rule| rule.apply(statement, description));
        Self { statement }
    }
}

impl Statement for RunRules<'_> {
    fn evaluate(&self) -> TestResult {
        self.statement.evaluate()
    }
}
