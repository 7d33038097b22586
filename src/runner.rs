//! The factory runner: exposes produced tests to the host as ordinary children.

use std::any::{Any, TypeId};
use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use factory_host::error::report_as_error;
use factory_host::{
    ClassLifecycle, Description, EachTestNotifier, InitializationError, ParentRunner, RunNotifier, TestClass,
    TestResult, catch_panic, invoke, is_assumption_violation,
};
use miette::{Diagnostic, Report, miette};

use crate::describe::{DescriptionMapper, production_failure};
use crate::lifecycle::{HookLayer, LifecycleCache, Scope, WrapperChain};
use crate::test::{AsAny, GeneratedTest, ProducerCapability, TestSink};

/// A produced test with the identity assigned at discovery.
pub struct DescribedTest {
    pub(crate) description: Description,
    pub(crate) occurrence: usize,
    pub(crate) test: Box<dyn GeneratedTest>,
    pub(crate) test_type: TypeId,
    pub(crate) declared: fn() -> Option<ClassLifecycle>,
}

impl DescribedTest {
    pub fn description(&self) -> &Description {
        &self.description
    }

    /// 1 for the first test with this name, 2 for the next one, and so on.
    pub fn occurrence(&self) -> usize {
        self.occurrence
    }

    /// The test object, as its hooks receive it.
    pub fn target(&self) -> &dyn Any {
        <dyn GeneratedTest as AsAny>::as_any(&*self.test)
    }

    pub fn execute(&self) -> TestResult {
        self.test.execute()
    }
}

impl fmt::Debug for DescribedTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescribedTest")
            .field("description", &self.description.unique_id())
            .field("occurrence", &self.occurrence)
            .finish()
    }
}

/// Raised by the placeholder test when a producer failed to generate its tests.
#[derive(Debug, Clone)]
pub struct ProductionFailed {
    class: String,
    cause: Arc<Report>,
}

impl ProductionFailed {
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The error the producer raised.
    pub fn cause(&self) -> &Report {
        &self.cause
    }
}

impl fmt::Display for ProductionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error raised during `produce_tests` of {}", self.class)
    }
}

impl std::error::Error for ProductionFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(report_as_error(&self.cause))
    }
}

impl Diagnostic for ProductionFailed {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("factory_runner::production_failed"))
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        Some(&**self.cause)
    }
}

/// Runs the tests a [`Producer`](crate::Producer) generates as children of its class.
///
/// The producer instance is created once, in [`FactoryRunner::new`], and shared by every child. Tests are produced
/// lazily on the first call to [`ParentRunner::children`] and never again.
pub struct FactoryRunner {
    class: TestClass,
    producer: ProducerCapability,
    instance: Box<dyn Any>,
    children: OnceCell<Vec<DescribedTest>>,
    lifecycles: LifecycleCache,
}

impl FactoryRunner {
    /// Validate `class` and create its producer instance.
    ///
    /// ## Errors
    ///
    /// - [`InitializationError::MissingCapability`] if the class was not registered as a producer
    /// - [`InitializationError::NoConstructor`] / [`InitializationError::Instantiation`] if no instance can be made
    pub fn new(class: TestClass) -> Result<Self, InitializationError> {
        let producer = class
            .capability::<ProducerCapability>()
            .copied()
            .ok_or_else(|| InitializationError::MissingCapability {
                class: class.name().to_string(),
                capability: "Producer",
            })?;
        let instance = class.new_instance()?;

        tracing::debug!(class = %class, "created producer instance");
        Ok(Self {
            class,
            producer,
            instance,
            children: OnceCell::new(),
            lifecycles: LifecycleCache::new(),
        })
    }

    /// The producer instance shared by every child.
    pub fn instance(&self) -> &dyn Any {
        &*self.instance
    }

    /// Whether tests have been produced yet.
    pub fn is_discovered(&self) -> bool {
        self.children.get().is_some()
    }

    #[tracing::instrument(level = "debug", skip_all, fields(class = %self.class))]
    fn discover(&self) -> Vec<DescribedTest> {
        let mut mapper = DescriptionMapper::new(self.class.clone());
        let mut sink = TestSink::new(&mut mapper);

        let produced = match self.producer.view(self.instance()) {
            Some(producer) => catch_panic(|| producer.produce_tests(&mut sink)),
            None => Err(miette!("producer instance is not a {}", self.class)),
        };

        match produced {
            Ok(()) => {
                let tests = sink.into_tests();
                tracing::debug!(count = tests.len(), duplicates = mapper.duplicate_count(), "produced tests");
                tests
            }
            Err(cause) => {
                tracing::warn!(error = %cause, "test production failed; reporting a placeholder test");
                vec![self.placeholder(cause)]
            }
        }
    }

    fn placeholder(&self, cause: Report) -> DescribedTest {
        let failure = ProductionFailed {
            class: self.class.name().to_string(),
            cause: Arc::new(cause),
        };
        DescribedTest {
            description: production_failure(&self.class),
            occurrence: 1,
            test: Box::new(Placeholder(failure)),
            test_type: TypeId::of::<Placeholder>(),
            declared: Placeholder::declared_lifecycle,
        }
    }

    /// Build the wrapper chain for `child` and evaluate it.
    fn evaluate(&self, child: &DescribedTest) -> TestResult {
        let declared = self.lifecycles.lookup(child.test_type, child.declared);
        let outer = HookLayer::new(Scope::Producer, self.class.lifecycle(), self.instance());
        let inner = declared
            .as_deref()
            .map(|lifecycle| HookLayer::new(Scope::Test, lifecycle, child.target()));

        let chain = WrapperChain::for_child(outer, inner);
        tracing::trace!(test = %child.description, stages = ?chain, "composed wrapper chain");

        let body = invoke(|| child.execute());
        chain.into_statement(body, &child.description)?.evaluate()
    }
}

/// Body of the test standing in for a failed production call.
struct Placeholder(ProductionFailed);

impl GeneratedTest for Placeholder {
    fn execute(&self) -> TestResult {
        Err(Report::new(self.0.clone()))
    }
}

/// Fires "test finished" when dropped, so it is reported however `run_child` exits.
struct FinishOnDrop<'a, 'n>(&'a EachTestNotifier<'n>);

impl Drop for FinishOnDrop<'_, '_> {
    fn drop(&mut self) {
        self.0.fire_test_finished();
    }
}

impl ParentRunner for FactoryRunner {
    type Child = DescribedTest;

    fn test_class(&self) -> &TestClass {
        &self.class
    }

    fn children(&self) -> &[DescribedTest] {
        self.children.get_or_init(|| self.discover())
    }

    fn describe_child(&self, child: &DescribedTest) -> Description {
        child.description.clone()
    }

    fn run_child(&self, child: &DescribedTest, notifier: &RunNotifier) {
        let each = EachTestNotifier::new(notifier, child.description.clone());
        each.fire_test_started();
        let _finished = FinishOnDrop(&each);

        match catch_panic(|| self.evaluate(child)) {
            Ok(()) => {}
            Err(err) if is_assumption_violation(&err) => each.add_failed_assumption(err),
            Err(err) => each.add_failure(err),
        }
    }
}

impl fmt::Debug for FactoryRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRunner")
            .field("class", &self.class.name())
            .field("children", &self.children.get())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use factory_host::{Core, Runner, fail};

    use super::*;
    use crate::describe::PRODUCTION_FAILURE_NAME;
    use crate::test::{Producer, ProducerClassExt, producer_class};

    #[derive(Default)]
    struct Broken {
        calls: Cell<u32>,
    }

    impl Producer for Broken {
        fn produce_tests(&self, sink: &mut TestSink<'_>) -> TestResult {
            self.calls.set(self.calls.get() + 1);
            sink.accept("discarded", || Ok(()));
            fail("cannot read fixtures")
        }
    }

    struct NotAProducer;

    #[test]
    fn test_class_without_capability_is_rejected() {
        let class = TestClass::builder::<NotAProducer>().constructor(|| Ok(NotAProducer)).build();
        let err = FactoryRunner::new(class).unwrap_err();
        assert!(err.to_string().ends_with("must implement Producer"));
    }

    #[test]
    fn test_failing_constructor_is_an_initialization_error() {
        let class = TestClass::builder::<Broken>()
            .constructor(|| Err(miette!("no fixtures directory")))
            .producer()
            .build();
        match FactoryRunner::new(class) {
            Err(InitializationError::Instantiation { cause, .. }) => {
                assert_eq!(cause.to_string(), "no fixtures directory")
            }
            other => panic!("expected instantiation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_production_failure_becomes_one_placeholder() {
        let runner = FactoryRunner::new(producer_class::<Broken>()).unwrap();
        assert!(!runner.is_discovered());

        let children = runner.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].description().method_name(), Some(PRODUCTION_FAILURE_NAME));

        let err = children[0].execute().unwrap_err();
        let failed = err.downcast_ref::<ProductionFailed>().unwrap();
        assert_eq!(failed.class(), runner.test_class().name());
        assert_eq!(failed.cause().to_string(), "cannot read fixtures");
        assert!(err.to_string().contains(runner.test_class().name()));

        runner.children();
        let instance = runner.instance().downcast_ref::<Broken>().unwrap();
        assert_eq!(instance.calls.get(), 1);
    }

    #[test]
    fn test_placeholder_reports_a_failure() {
        let runner = FactoryRunner::new(producer_class::<Broken>()).unwrap();
        let summary = Core::new().run(&runner);
        assert_eq!(summary.run_count, 1);
        assert_eq!(summary.failure_count, 1);
        assert!(summary.failures[0].contains("error raised during `produce_tests`"));
    }

    #[test]
    fn test_production_failure_chains_to_its_cause() {
        let runner = FactoryRunner::new(producer_class::<Broken>()).unwrap();
        let err = runner.children()[0].execute().unwrap_err();

        let chain: Vec<String> = err.chain().map(ToString::to_string).collect();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1], "cannot read fixtures");

        let failed = err.downcast_ref::<ProductionFailed>().unwrap();
        let source = std::error::Error::source(failed).unwrap();
        assert_eq!(source.to_string(), "cannot read fixtures");
    }

    #[test]
    fn test_placeholder_is_keyed_by_its_own_type() {
        let runner = FactoryRunner::new(producer_class::<Broken>()).unwrap();
        let placeholder = &runner.children()[0];
        assert_eq!(placeholder.test_type, placeholder.target().type_id());
    }

    #[derive(Default)]
    struct Panicking;

    impl Producer for Panicking {
        fn produce_tests(&self, _sink: &mut TestSink<'_>) -> TestResult {
            panic!("fixture table is corrupt")
        }
    }

    #[test]
    fn test_panicking_producer_is_contained() {
        let runner = FactoryRunner::new(producer_class::<Panicking>()).unwrap();
        let description = runner.description();
        assert_eq!(description.test_count(), 1);

        let err = runner.children()[0].execute().unwrap_err();
        let failed = err.downcast_ref::<ProductionFailed>().unwrap();
        assert_eq!(failed.cause().to_string(), "fixture table is corrupt");
    }
}
