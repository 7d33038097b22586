//! Test identity as the host reports and filters it.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::class::{TestClass, simple_name_of};

/// Identity token for a test or a suite.
///
/// Two descriptions are equal when their unique ids are equal; display names are for humans and may repeat.
#[derive(Debug, Clone)]
pub struct Description {
    class_name: String,
    method_name: Option<String>,
    display_name: String,
    unique_id: String,
    children: Vec<Description>,
}

impl Description {
    /// A suite description for every test of `class`.
    pub fn suite(class: &TestClass) -> Self {
        Self::suite_named(class.name())
    }

    pub fn suite_named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            class_name: name.clone(),
            method_name: None,
            display_name: name.clone(),
            unique_id: name,
            children: Vec::new(),
        }
    }

    /// A test description scoped to `class`, displayed as `name(class)`.
    pub fn test(class: &TestClass, name: impl Into<String>) -> Self {
        Self::test_named(class.name(), name)
    }

    pub fn test_named(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        let name = name.into();
        let display_name = format!("{}({})", name, class_name);
        Self {
            class_name,
            method_name: Some(name),
            unique_id: display_name.clone(),
            display_name,
            children: Vec::new(),
        }
    }

    /// Replace the unique id, keeping the display name.
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = unique_id.into();
        self
    }

    pub fn add_child(&mut self, child: Description) {
        self.children.push(child);
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn simple_class_name(&self) -> &str {
        simple_name_of(&self.class_name)
    }

    /// The test's method name; `None` for suites.
    pub fn method_name(&self) -> Option<&str> {
        self.method_name.as_deref()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn children(&self) -> &[Description] {
        &self.children
    }

    pub fn is_test(&self) -> bool {
        self.method_name.is_some()
    }

    pub fn is_suite(&self) -> bool {
        !self.is_test()
    }

    /// Number of test descriptions in this tree.
    pub fn test_count(&self) -> usize {
        if self.is_test() {
            1
        } else {
            self.children.iter().map(Description::test_count).sum()
        }
    }
}

impl PartialEq for Description {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
    }
}

impl Eq for Description {}

impl Hash for Description {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_id.hash(state);
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_display_and_identity() {
        let description = Description::test_named("demo::Arithmetic", "Addition: 1 + 1 = 2");
        assert_eq!(description.to_string(), "Addition: 1 + 1 = 2(demo::Arithmetic)");
        assert_eq!(description.method_name(), Some("Addition: 1 + 1 = 2"));
        assert_eq!(description.simple_class_name(), "Arithmetic");
        assert!(description.is_test());
    }

    #[test]
    fn test_equality_follows_unique_id() {
        let first = Description::test_named("demo::Suite", "a");
        let second = Description::test_named("demo::Suite", "a").with_unique_id("a(demo::Suite) #2");
        assert_ne!(first, second);
        assert_eq!(first.display_name(), second.display_name());
        assert_eq!(first, Description::test_named("demo::Suite", "a"));
    }

    #[test]
    fn test_suite_counts_children() {
        let mut suite = Description::suite_named("demo::Suite");
        suite.add_child(Description::test_named("demo::Suite", "a"));
        suite.add_child(Description::test_named("demo::Suite", "b"));
        assert!(suite.is_suite());
        assert_eq!(suite.test_count(), 2);
        assert_eq!(suite.method_name(), None);
    }
}
