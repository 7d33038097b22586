//! Class model: what the host knows about a test type.
//!
//! Rust has no reflection, so the members a statically declared test would carry as annotations ("run before each
//! test", "wrap each test with this rule", ...) are registered explicitly through [`TestClassBuilder`]. The result
//! is a [`TestClass`] token the host and runners can query without knowing the concrete type.
//!
//! ## Member kinds
//!
//! | Member | Registered with | Receives |
//! |---|---|---|
//! | before / after | [`TestClassBuilder::before`], [`TestClassBuilder::after`] | the test instance |
//! | rule | [`TestClassBuilder::rule`] | the test instance, returns a [`TestRule`] it owns |
//! | before-class / after-class | [`TestClassBuilder::before_class`], [`TestClassBuilder::after_class`] | nothing |
//!
//! Members are stored type-erased over `&dyn Any`; handing a member the wrong instance type is reported as a test
//! failure, never a panic.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::rc::Rc;

use miette::miette;

use crate::error::{InitializationError, TestResult, catch_panic};
use crate::rules::TestRule;

type HookFn = dyn Fn(&dyn Any) -> TestResult;
type ConstructorFn = dyn Fn() -> TestResult<Box<dyn Any>>;

/// Last path segment of a type name, ignoring generic arguments.
pub fn simple_name_of(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base)
}

/// A named setup or teardown member.
#[derive(Clone)]
pub struct HookMember {
    name: String,
    call: Rc<HookFn>,
}

impl HookMember {
    fn typed<T: Any>(name: impl Into<String>, hook: impl Fn(&T) -> TestResult + 'static) -> Self {
        let name = name.into();
        let label = name.clone();
        let call = move |target: &dyn Any| match target.downcast_ref::<T>() {
            Some(instance) => hook(instance),
            None => Err(miette!("hook `{}` expects an instance of {}", label, type_name::<T>())),
        };
        Self {
            name,
            call: Rc::new(call),
        }
    }

    fn static_hook(name: impl Into<String>, hook: impl Fn() -> TestResult + 'static) -> Self {
        Self {
            name: name.into(),
            call: Rc::new(move |_: &dyn Any| hook()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the hook against `target`; panics are reported as failures.
    pub fn invoke(&self, target: &dyn Any) -> TestResult {
        catch_panic(|| (self.call)(target))
    }
}

impl fmt::Debug for HookMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookMember").field("name", &self.name).finish()
    }
}

trait RuleAccessor {
    fn rule<'a>(&self, target: &'a dyn Any) -> Option<&'a dyn TestRule>;
}

struct TypedRule<T> {
    get: fn(&T) -> &dyn TestRule,
}

impl<T: Any> RuleAccessor for TypedRule<T> {
    fn rule<'a>(&self, target: &'a dyn Any) -> Option<&'a dyn TestRule> {
        target.downcast_ref::<T>().map(|instance| (self.get)(instance))
    }
}

/// A named rule provider: reads the rule value off a test instance.
#[derive(Clone)]
pub struct RuleMember {
    name: String,
    owner: &'static str,
    accessor: Rc<dyn RuleAccessor>,
}

impl RuleMember {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rule value held by `target`.
    pub fn value<'a>(&self, target: &'a dyn Any) -> TestResult<&'a dyn TestRule> {
        self.accessor
            .rule(target)
            .ok_or_else(|| miette!("rule `{}` expects an instance of {}", self.name, self.owner))
    }
}

impl fmt::Debug for RuleMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleMember")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Lifecycle members declared by one type, in declaration order.
///
/// Built once per type; reading it has no side effects, so it may be shared by every test of a run.
#[derive(Debug, Clone, Default)]
pub struct ClassLifecycle {
    befores: Vec<HookMember>,
    afters: Vec<HookMember>,
    rules: Vec<RuleMember>,
    before_class: Vec<HookMember>,
    after_class: Vec<HookMember>,
}

impl ClassLifecycle {
    /// Start declaring the lifecycle of `T`.
    pub fn of<T: Any>() -> LifecycleBuilder<T> {
        LifecycleBuilder {
            lifecycle: ClassLifecycle::default(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn befores(&self) -> &[HookMember] {
        &self.befores
    }

    pub fn afters(&self) -> &[HookMember] {
        &self.afters
    }

    pub fn rules(&self) -> &[RuleMember] {
        &self.rules
    }

    pub fn before_class(&self) -> &[HookMember] {
        &self.before_class
    }

    pub fn after_class(&self) -> &[HookMember] {
        &self.after_class
    }

    /// True when no per-test member is declared.
    pub fn is_empty(&self) -> bool {
        self.befores.is_empty() && self.afters.is_empty() && self.rules.is_empty()
    }
}

/// Typed builder for a [`ClassLifecycle`].
pub struct LifecycleBuilder<T> {
    lifecycle: ClassLifecycle,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T: Any> LifecycleBuilder<T> {
    /// Run `hook` before each test.
    pub fn before(mut self, name: impl Into<String>, hook: impl Fn(&T) -> TestResult + 'static) -> Self {
        self.lifecycle.befores.push(HookMember::typed(name, hook));
        self
    }

    /// Run `hook` after each test, whatever its outcome.
    pub fn after(mut self, name: impl Into<String>, hook: impl Fn(&T) -> TestResult + 'static) -> Self {
        self.lifecycle.afters.push(HookMember::typed(name, hook));
        self
    }

    /// Wrap each test with the rule returned by `get`.
    pub fn rule(mut self, name: impl Into<String>, get: fn(&T) -> &dyn TestRule) -> Self {
        self.lifecycle.rules.push(RuleMember {
            name: name.into(),
            owner: type_name::<T>(),
            accessor: Rc::new(TypedRule { get }),
        });
        self
    }

    /// Run `hook` once before any test of the class.
    pub fn before_class(mut self, name: impl Into<String>, hook: impl Fn() -> TestResult + 'static) -> Self {
        self.lifecycle.before_class.push(HookMember::static_hook(name, hook));
        self
    }

    /// Run `hook` once after every test of the class.
    pub fn after_class(mut self, name: impl Into<String>, hook: impl Fn() -> TestResult + 'static) -> Self {
        self.lifecycle.after_class.push(HookMember::static_hook(name, hook));
        self
    }

    pub fn build(self) -> ClassLifecycle {
        self.lifecycle
    }
}

struct ClassInner {
    name: &'static str,
    type_id: TypeId,
    constructor: Option<Box<ConstructorFn>>,
    lifecycle: ClassLifecycle,
    capabilities: Vec<Box<dyn Any>>,
}

/// Handle to a registered test type. Cheap to clone.
#[derive(Clone)]
pub struct TestClass {
    inner: Rc<ClassInner>,
}

impl TestClass {
    pub fn builder<T: Any>() -> TestClassBuilder<T> {
        TestClassBuilder {
            constructor: None,
            lifecycle: ClassLifecycle::of::<T>(),
            capabilities: Vec::new(),
        }
    }

    /// Full type path, e.g. `my_tests::Arithmetic`.
    pub fn name(&self) -> &str {
        self.inner.name
    }

    /// Type name without its module path.
    pub fn simple_name(&self) -> &str {
        simple_name_of(self.inner.name)
    }

    pub fn type_id(&self) -> TypeId {
        self.inner.type_id
    }

    pub fn lifecycle(&self) -> &ClassLifecycle {
        &self.inner.lifecycle
    }

    /// A capability registered for this class, if any.
    pub fn capability<C: Any>(&self) -> Option<&C> {
        self.inner
            .capabilities
            .iter()
            .find_map(|capability| capability.downcast_ref::<C>())
    }

    /// Construct one instance through the registered constructor.
    ///
    /// ## Errors
    ///
    /// - [`InitializationError::NoConstructor`] if none was registered
    /// - [`InitializationError::Instantiation`] if the constructor failed or panicked
    pub fn new_instance(&self) -> Result<Box<dyn Any>, InitializationError> {
        let constructor = self
            .inner
            .constructor
            .as_ref()
            .ok_or_else(|| InitializationError::NoConstructor {
                class: self.name().to_string(),
            })?;

        catch_panic(|| constructor()).map_err(|cause| InitializationError::Instantiation {
            class: self.name().to_string(),
            cause,
        })
    }
}

impl PartialEq for TestClass {
    fn eq(&self, other: &Self) -> bool {
        self.inner.type_id == other.inner.type_id
    }
}

impl Eq for TestClass {}

impl fmt::Debug for TestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClass")
            .field("name", &self.inner.name)
            .field("lifecycle", &self.inner.lifecycle)
            .field("capabilities", &self.inner.capabilities.len())
            .finish()
    }
}

impl fmt::Display for TestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.inner.name)
    }
}

/// Typed builder for a [`TestClass`].
pub struct TestClassBuilder<T> {
    constructor: Option<Box<ConstructorFn>>,
    lifecycle: LifecycleBuilder<T>,
    capabilities: Vec<Box<dyn Any>>,
}

impl<T: Any> TestClassBuilder<T> {
    /// Register the constructor used to create the single instance of a run.
    pub fn constructor(mut self, constructor: impl Fn() -> TestResult<T> + 'static) -> Self {
        self.constructor = Some(Box::new(move || constructor().map(|instance| Box::new(instance) as Box<dyn Any>)));
        self
    }

    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(|| Ok(T::default()))
    }

    pub fn before(mut self, name: impl Into<String>, hook: impl Fn(&T) -> TestResult + 'static) -> Self {
        self.lifecycle = self.lifecycle.before(name, hook);
        self
    }

    pub fn after(mut self, name: impl Into<String>, hook: impl Fn(&T) -> TestResult + 'static) -> Self {
        self.lifecycle = self.lifecycle.after(name, hook);
        self
    }

    pub fn rule(mut self, name: impl Into<String>, get: fn(&T) -> &dyn TestRule) -> Self {
        self.lifecycle = self.lifecycle.rule(name, get);
        self
    }

    pub fn before_class(mut self, name: impl Into<String>, hook: impl Fn() -> TestResult + 'static) -> Self {
        self.lifecycle = self.lifecycle.before_class(name, hook);
        self
    }

    pub fn after_class(mut self, name: impl Into<String>, hook: impl Fn() -> TestResult + 'static) -> Self {
        self.lifecycle = self.lifecycle.after_class(name, hook);
        self
    }

    /// Attach a capability that runners can look up with [`TestClass::capability`].
    pub fn capability<C: Any>(mut self, capability: C) -> Self {
        self.capabilities.push(Box::new(capability));
        self
    }

    pub fn build(self) -> TestClass {
        TestClass {
            inner: Rc::new(ClassInner {
                name: type_name::<T>(),
                type_id: TypeId::of::<T>(),
                constructor: self.constructor,
                lifecycle: self.lifecycle.build(),
                capabilities: self.capabilities,
            }),
        }
    }
}
