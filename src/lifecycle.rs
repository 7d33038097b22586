//! Wrapper chain composition for one generated test.
//!
//! A generated test gets the hooks a declared test of the producer class would get, and optionally the hooks its own
//! type declares. The two sets are composed as layers, producer outside:
//!
//! ```text
//! producer rules
//!   producer afters
//!     producer befores
//!       test rules
//!         test afters
//!           test befores
//!             body
//! ```
//!
//! Stages with no members are left out. The chain is rebuilt for every child and dropped after it runs; only the
//! per-type lifecycle lookup is cached.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use factory_host::{BoxStatement, ClassLifecycle, Description, RunAfters, RunBefores, RunRules, TestResult, TestRule};

/// Which declaration a layer comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Producer,
    Test,
}

/// Kind of one stage of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Rules,
    Afters,
    Befores,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Producer => f.write_str("producer"),
            Scope::Test => f.write_str("test"),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Rules => f.write_str("rules"),
            StageKind::Afters => f.write_str("afters"),
            StageKind::Befores => f.write_str("befores"),
        }
    }
}

/// A lifecycle together with the instance its members run against.
#[derive(Clone, Copy)]
pub struct HookLayer<'a> {
    scope: Scope,
    lifecycle: &'a ClassLifecycle,
    target: &'a dyn Any,
}

impl<'a> HookLayer<'a> {
    pub fn new(scope: Scope, lifecycle: &'a ClassLifecycle, target: &'a dyn Any) -> Self {
        Self {
            scope,
            lifecycle,
            target,
        }
    }

    fn stages(self) -> impl Iterator<Item = Stage<'a>> {
        [StageKind::Rules, StageKind::Afters, StageKind::Befores]
            .into_iter()
            .map(move |kind| Stage { kind, layer: self })
            .filter(|stage| !stage.is_empty())
    }
}

#[derive(Clone, Copy)]
struct Stage<'a> {
    kind: StageKind,
    layer: HookLayer<'a>,
}

impl<'a> Stage<'a> {
    fn is_empty(&self) -> bool {
        let lifecycle = self.layer.lifecycle;
        match self.kind {
            StageKind::Rules => lifecycle.rules().is_empty(),
            StageKind::Afters => lifecycle.afters().is_empty(),
            StageKind::Befores => lifecycle.befores().is_empty(),
        }
    }

    fn wrap(self, next: BoxStatement<'a>, description: &'a Description) -> TestResult<BoxStatement<'a>> {
        let HookLayer {
            lifecycle, target, ..
        } = self.layer;
        let statement: BoxStatement<'a> = match self.kind {
            StageKind::Befores => Box::new(RunBefores::new(next, lifecycle.befores(), target)),
            StageKind::Afters => Box::new(RunAfters::new(next, lifecycle.afters(), target)),
            StageKind::Rules => {
                let rules = lifecycle
                    .rules()
                    .iter()
                    .map(|rule| rule.value(target))
                    .collect::<TestResult<Vec<&'a dyn TestRule>>>()?;
                Box::new(RunRules::new(next, rules, description))
            }
        };
        Ok(statement)
    }
}

/// The ordered stages wrapped around one generated test, outermost first.
pub struct WrapperChain<'a> {
    stages: Vec<Stage<'a>>,
}

impl<'a> WrapperChain<'a> {
    /// Compose the producer layer `outer` around the optional test layer `inner`.
    pub fn for_child(outer: HookLayer<'a>, inner: Option<HookLayer<'a>>) -> Self {
        let stages = outer.stages().chain(inner.into_iter().flat_map(HookLayer::stages)).collect();
        Self { stages }
    }

    /// `(scope, kind)` of every stage, outermost first.
    pub fn stages(&self) -> Vec<(Scope, StageKind)> {
        self.stages
            .iter()
            .map(|stage| (stage.layer.scope, stage.kind))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Wrap `body` in every stage, innermost first.
    ///
    /// Fails when a rule cannot be read off its instance.
    pub fn into_statement(self, body: BoxStatement<'a>, description: &'a Description) -> TestResult<BoxStatement<'a>> {
        self.stages
            .into_iter()
            .rev()
            .try_fold(body, |statement, stage| stage.wrap(statement, description))
    }
}

impl fmt::Debug for WrapperChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages().iter().map(|(scope, kind)| format!("{} {}", scope, kind)))
            .finish()
    }
}

/// Per-type cache of lifecycles declared by generated test types.
///
/// Lookup depends only on the type, so each type's declaration is built at most once per runner.
#[derive(Default)]
pub struct LifecycleCache {
    entries: RefCell<HashMap<TypeId, Option<Rc<ClassLifecycle>>>>,
}

impl LifecycleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The non-empty lifecycle declared by the type `type_id`, building it with `declare` on first use.
    pub fn lookup(&self, type_id: TypeId, declare: fn() -> Option<ClassLifecycle>) -> Option<Rc<ClassLifecycle>> {
        if let Some(cached) = self.entries.borrow().get(&type_id) {
            return cached.clone();
        }
        let declared = declare().filter(|lifecycle| !lifecycle.is_empty()).map(Rc::new);
        self.entries.borrow_mut().insert(type_id, declared.clone());
        declared
    }

    /// Number of types looked up so far.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
