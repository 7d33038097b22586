#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
//! Host harness contract.
//!
//! This crate is the test host that custom runners plug into: it owns the identity of tests ([`Description`]), the
//! event channel they report through ([`RunNotifier`]), the deferred execution model ([`Statement`]) and the
//! resource rules that wrap it ([`TestRule`]). A runner implements [`ParentRunner`] and gets class-level hooks,
//! filtering and summaries from [`Runner`] and [`Core`].
//!
//! Everything here is single-threaded: instances, rules and hooks are shared through `Rc` and evaluated on the
//! thread that drives the run.

pub mod class;
pub mod description;
pub mod error;
pub mod notification;
pub mod rules;
pub mod runner;
pub mod statement;

pub use class::{ClassLifecycle, HookMember, LifecycleBuilder, RuleMember, TestClass, TestClassBuilder};
pub use description::Description;
pub use error::{
    AssertionFailed, AssumptionViolated, InitializationError, MultipleFailures, TestPanicked, TestResult, assume,
    catch_panic, fail, is_assumption_violation,
};
pub use notification::{EachTestNotifier, Failure, RunListener, RunNotifier, RunSummary, SummaryListener};
pub use rules::{ExternalResource, TemporaryFolder, TestName, TestRule};
pub use runner::{Core, Filter, ParentRunner, Runner};
pub use statement::{BoxStatement, RunAfters, RunBefores, RunRules, Statement, invoke};
