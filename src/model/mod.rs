//! Element model: the "classes" and "methods" a harness registers for discovery.
//!
//! The engine never inspects host types. Harness authors describe test classes as plain data (name,
//! markers, declared extensions, an instance factory and callable method bodies) and the engine works
//! exclusively through that description plus three collaborators:
//!
//! - [`Classifier`]: decides whether an element is a test, a container, a lifecycle hook
//! - [`ClassSource`]: finds classes by name, package or classpath root ([`Catalog`] is the in-memory default)
//! - [`Invoker`]: invokes a callable and normalizes what it raised

mod catalog;
mod class;
mod classifier;
mod invoker;
mod method;

pub use catalog::{Catalog, ClassEntry, ClassSource};
pub use class::{TestClass, TestClassBuilder};
pub use classifier::{Classifier, LifecycleRole, MarkerClassifier};
pub use invoker::{DefaultInvoker, Invoker};
pub use method::{DynamicTest, Parameter, TestMethod};

use std::any::Any;
use std::rc::Rc;

use trellis_core::Fallible;

/// A value passed into or returned from a callable.
pub type Value = Rc<dyn Any>;

/// A test class instance.
pub type Instance = Rc<dyn Any>;

/// A method body: receives the declaring class instance (absent for static methods) and resolved arguments.
pub type Callable = Rc<dyn Fn(Option<&Instance>, &[Value]) -> Fallible<Option<Value>>>;

/// Creates a class instance. Nested classes receive the enclosing instance.
pub type InstanceFactory = Rc<dyn Fn(Option<&Instance>) -> Fallible<Instance>>;

/// Declarative metadata attached to classes, methods and parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Test,
    TestFactory,
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
    Nested,
    Disabled(String),
    Tag(String),
    DisplayName(String),
    Custom(String),
}

/// Queries over a marker list shared by classes, methods and parameters.
pub trait Annotated {
    fn markers(&self) -> &[Marker];

    fn has_marker(&self, marker: &Marker) -> bool {
        self.markers().contains(marker)
    }

    fn has_custom(&self, name: &str) -> bool {
        self.markers().iter().any(|m| matches!(m, Marker::Custom(c) if c == name))
    }

    /// Non-blank tags in declaration order, without duplicates.
    fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for marker in self.markers() {
            if let Marker::Tag(tag) = marker {
                let tag = tag.trim();
                if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                    tags.push(tag.to_string());
                }
            }
        }
        tags
    }

    fn declared_display_name(&self) -> Option<&str> {
        self.markers().iter().find_map(|m| match m {
            Marker::DisplayName(name) if !name.trim().is_empty() => Some(name.as_str()),
            _ => None,
        })
    }

    fn disabled_reason(&self) -> Option<&str> {
        self.markers().iter().find_map(|m| match m {
            Marker::Disabled(reason) => Some(reason.as_str()),
            _ => None,
        })
    }
}

/// Downcast an instance to the type a typed method body expects.
pub(crate) fn downcast_instance<'a, T: 'static>(instance: Option<&'a Instance>, method: &str) -> Fallible<&'a T> {
    let instance = instance.ok_or_else(|| {
        trellis_core::Failure::configuration(format!("method '{method}' requires a test instance but none was provided"))
    })?;
    instance.downcast_ref::<T>().ok_or_else(|| {
        trellis_core::Failure::configuration(format!(
            "method '{method}' expected an instance of {} but received a different type",
            std::any::type_name::<T>()
        ))
    })
}
