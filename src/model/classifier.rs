//! Element classification.

use super::{Annotated, Marker, TestClass, TestMethod};

/// The lifecycle hook a method is registered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleRole {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

/// Decides what an element is. Discovery and lifecycle registration only ever ask these questions.
pub trait Classifier {
    fn is_test_method(&self, method: &TestMethod) -> bool;

    fn is_test_factory(&self, method: &TestMethod) -> bool;

    fn lifecycle_role(&self, method: &TestMethod) -> Option<LifecycleRole>;

    /// Whether a member class of a test class is itself a nested test container.
    fn is_nested_class(&self, class: &TestClass) -> bool;

    /// Whether a class qualifies as a test container: concrete, with at least one test, factory or
    /// nested test class.
    fn is_test_class(&self, class: &TestClass) -> bool {
        if class.is_abstract() {
            return false;
        }
        class
            .methods()
            .iter()
            .any(|m| self.is_test_method(m) || self.is_test_factory(m))
            || class.nested_classes().iter().any(|n| self.is_nested_class(n))
    }
}

/// Classifies by [`Marker`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerClassifier;

impl Classifier for MarkerClassifier {
    fn is_test_method(&self, method: &TestMethod) -> bool {
        method.has_marker(&Marker::Test)
    }

    fn is_test_factory(&self, method: &TestMethod) -> bool {
        method.has_marker(&Marker::TestFactory)
    }

    fn lifecycle_role(&self, method: &TestMethod) -> Option<LifecycleRole> {
        method.markers().iter().find_map(|marker| match marker {
            Marker::BeforeAll => Some(LifecycleRole::BeforeAll),
            Marker::AfterAll => Some(LifecycleRole::AfterAll),
            Marker::BeforeEach => Some(LifecycleRole::BeforeEach),
            Marker::AfterEach => Some(LifecycleRole::AfterEach),
            _ => None,
        })
    }

    fn is_nested_class(&self, class: &TestClass) -> bool {
        // static member classes are independent containers, never nested ones
        if class.is_static() {
            return false;
        }
        class.has_marker(&Marker::Nested) && !class.is_abstract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture;

    #[test]
    fn test_class_with_only_lifecycle_methods_is_not_a_test_class() {
        let class = TestClass::builder("a.OnlyHooks")
            .before_each::<Fixture>("setup", |_| Ok(()))
            .build();
        assert!(!MarkerClassifier.is_test_class(&class));
    }

    #[test]
    fn test_class_with_nested_test_class_qualifies() {
        let nested = TestClass::builder("a.Outer$Inner")
            .marker(Marker::Nested)
            .test::<Fixture>("t", |_| Ok(()))
            .build();
        let class = TestClass::builder("a.Outer").nested(nested).build();
        assert!(MarkerClassifier.is_test_class(&class));
    }

    #[test]
    fn test_static_member_is_not_nested() {
        let class = TestClass::builder("a.Outer$Helper")
            .marker(Marker::Nested)
            .static_member()
            .build();
        assert!(!MarkerClassifier.is_nested_class(&class));
    }

    #[test]
    fn test_abstract_class_is_not_test_class() {
        let class = TestClass::builder("a.Base")
            .abstract_class()
            .test::<Fixture>("t", |_| Ok(()))
            .build();
        assert!(!MarkerClassifier.is_test_class(&class));
    }

    #[test]
    fn test_lifecycle_role() {
        let class = TestClass::builder("a.B")
            .after_all("teardown", || Ok(()))
            .test::<Fixture>("t", |_| Ok(()))
            .build();
        let teardown = class.find_method("teardown").unwrap();
        assert_eq!(MarkerClassifier.lifecycle_role(teardown), Some(LifecycleRole::AfterAll));
        assert_eq!(MarkerClassifier.lifecycle_role(class.find_method("t").unwrap()), None);
    }
}
