//! Resource rules: scoped behaviour wrapped around a test's execution.
//!
//! A rule receives the statement it wraps and the description of the test, and returns a new statement. It may
//! acquire a resource before evaluating the base and release it afterwards, record the test name, or refuse to run
//! the base at all.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use miette::{IntoDiagnostic, miette};
use tempfile::TempDir;

use crate::description::Description;
use crate::error::{TestResult, catch_panic};
use crate::statement::BoxStatement;

/// Wraps a statement with additional behaviour.
pub trait TestRule {
    fn apply<'a>(&'a self, base: BoxStatement<'a>, description: &'a Description) -> BoxStatement<'a>;
}

/// A resource acquired before each test and released after it.
///
/// `after` runs whether the test passed or failed, but not when `before` itself failed.
pub trait ExternalResource {
    fn before(&self) -> TestResult {
        Ok(())
    }

    fn after(&self) {}
}

impl<R: ExternalResource> TestRule for R {
    fn apply<'a>(&'a self, base: BoxStatement<'a>, _description: &'a Description) -> BoxStatement<'a> {
        Box::new(move || {
            self.before()?;
            let result = catch_panic(|| base.evaluate());
            self.after();
            result
        })
    }
}

/// A fresh directory for every test, deleted when the test finishes.
///
/// Clones share the same slot, so a producer can hand a clone to each generated test.
#[derive(Debug, Clone, Default)]
pub struct TemporaryFolder {
    dir: Rc<RefCell<Option<TempDir>>>,
}

impl TemporaryFolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current test's directory.
    pub fn root(&self) -> TestResult<PathBuf> {
        self.dir
            .borrow()
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or_else(|| miette!("temporary folder has not been created; is the rule registered?"))
    }

    /// Create an empty file inside the folder.
    pub fn new_file(&self, name: &str) -> TestResult<PathBuf> {
        let path = self.root()?.join(name);
        fs::File::create(&path).into_diagnostic()?;
        Ok(path)
    }

    /// Create a directory inside the folder.
    pub fn new_folder(&self, name: &str) -> TestResult<PathBuf> {
        let path = self.root()?.join(name);
        fs::create_dir_all(&path).into_diagnostic()?;
        Ok(path)
    }
}

impl ExternalResource for TemporaryFolder {
    fn before(&self) -> TestResult {
        let dir = tempfile::Builder::new()
            .prefix("factory-runner-")
            .tempdir()
            .into_diagnostic()?;
        *self.dir.borrow_mut() = Some(dir);
        Ok(())
    }

    fn after(&self) {
        if let Some(dir) = self.dir.borrow_mut().take() {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                tracing::warn!(path = %path.display(), error = %err, "failed to delete temporary folder");
            }
        }
    }
}

/// Makes the running test's method name available inside the test.
#[derive(Debug, Clone, Default)]
pub struct TestName {
    name: Rc<RefCell<Option<String>>>,
}

impl TestName {
    pub fn new() -> Self {
        Self::default()
    }

    /// The method name of the test currently wrapped by this rule.
    pub fn method_name(&self) -> Option<String> {
        self.name.borrow().clone()
    }
}

impl TestRule for TestName {
    fn apply<'a>(&'a self, base: BoxStatement<'a>, description: &'a Description) -> BoxStatement<'a> {
        Box::new(move || {
            *self.name.borrow_mut() = description.method_name().map(str::to_owned);
            base.evaluate()
        })
    }
}
