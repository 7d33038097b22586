//! Identity for generated tests.
//!
//! Every produced name becomes a test description scoped to the producing class. Names are expected to be unique
//! within a run; a repeated name is kept (both tests run and report) but its description gets a disambiguated unique
//! id so the host never conflates the two.

use std::collections::HashMap;

use factory_host::{Description, TestClass};

/// Method name of the placeholder that reports a failed production call.
pub const PRODUCTION_FAILURE_NAME: &str = "test-production-failure";

/// Method name of the test reported for a class that could not be initialised.
pub const INITIALIZATION_ERROR_NAME: &str = "initialization-error";

/// Assigns descriptions to produced names, counting occurrences per name.
#[derive(Debug)]
pub struct DescriptionMapper {
    class: TestClass,
    occurrences: HashMap<String, usize>,
}

impl DescriptionMapper {
    pub fn new(class: TestClass) -> Self {
        Self {
            class,
            occurrences: HashMap::new(),
        }
    }

    /// Describe the next test called `name`, returning its description and 1-based occurrence.
    pub fn describe(&mut self, name: &str) -> (Description, usize) {
        let occurrence = self
            .occurrences
            .entry(name.to_string())
            .and_modify(|seen| *seen += 1)
            .or_insert(1);
        let occurrence = *occurrence;

        let description = Description::test(&self.class, name);
        if occurrence == 1 {
            return (description, occurrence);
        }

        tracing::warn!(
            class = %self.class,
            name,
            occurrence,
            "duplicate test name; keeping both with distinct ids"
        );
        let unique_id = format!("{} #{}", description.unique_id(), occurrence);
        (description.with_unique_id(unique_id), occurrence)
    }

    /// Number of names seen more than once.
    pub fn duplicate_count(&self) -> usize {
        self.occurrences.values().filter(|&&seen| seen > 1).count()
    }
}

/// Description of the placeholder standing in for a failed production call.
pub fn production_failure(class: &TestClass) -> Description {
    Description::test(class, PRODUCTION_FAILURE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample;

    fn mapper() -> DescriptionMapper {
        DescriptionMapper::new(TestClass::builder::<Sample>().build())
    }

    #[test]
    fn test_unique_names_keep_plain_ids() {
        let mut mapper = mapper();
        let (first, n) = mapper.describe("first");
        let (second, _) = mapper.describe("second");

        assert_eq!(n, 1);
        assert_eq!(first.unique_id(), first.display_name());
        assert_ne!(first, second);
        assert_eq!(mapper.duplicate_count(), 0);
    }

    #[test]
    fn test_duplicates_are_kept_apart() {
        let mut mapper = mapper();
        let (first, _) = mapper.describe("same");
        let (second, n) = mapper.describe("same");
        let (third, _) = mapper.describe("same");

        assert_eq!(n, 2);
        assert_eq!(second.method_name(), Some("same"));
        assert_eq!(first.display_name(), second.display_name());
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert!(third.unique_id().ends_with(" #3"));
        assert_eq!(mapper.duplicate_count(), 1);
    }

    #[test]
    fn test_production_failure_names_the_class() {
        let class = TestClass::builder::<Sample>().build();
        let description = production_failure(&class);
        assert_eq!(description.method_name(), Some(PRODUCTION_FAILURE_NAME));
        assert_eq!(description.class_name(), class.name());
    }
}
