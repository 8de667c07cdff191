//! Lifecycle methods registered as callbacks.

use std::rc::Rc;

use trellis_core::{Fallible, Failure};

use super::MethodInvoker;
use crate::extension::{
    AfterAllCallback, AfterEachCallback, BeforeAllCallback, BeforeEachCallback, ExtensionContext, ExtensionPoint,
    ExtensionRegistry, Position, RegistrationScope, RegistrationSource,
};
use crate::model::{Classifier, Invoker, LifecycleRole, TestClass, TestMethod};

/// A `BeforeAll`/`AfterAll`/`BeforeEach`/`AfterEach` method of a class, invoked as a callback.
///
/// Instance methods run against the instance of their declaring class taken from the context's instance
/// chain, so an outer class's hooks see the outer instance even when a nested test runs.
pub(crate) struct LifecycleMethod {
    class: Rc<TestClass>,
    method: Rc<TestMethod>,
    invoker: Rc<dyn Invoker>,
}

impl LifecycleMethod {
    fn call(&self, context: &ExtensionContext) -> Fallible {
        let instance = if self.method.is_static() {
            None
        } else {
            let instance = context
                .test_instances()
                .and_then(|instances| instances.find(self.class.name()).cloned())
                .ok_or_else(|| {
                    Failure::configuration(format!(
                        "no instance of '{}' is available to invoke '{}'",
                        self.class.name(),
                        self.method.name()
                    ))
                })?;
            Some(instance)
        };
        let registry = context.registry().ok_or_else(|| {
            Failure::configuration(format!("context '{}' has no extension registry", context.unique_id()))
        })?;
        MethodInvoker::new(registry, self.invoker.as_ref())
            .invoke(&self.class, &self.method, instance.as_ref(), context)
            .map(|_| ())
    }
}

impl BeforeAllCallback for LifecycleMethod {
    fn before_all(&self, context: &ExtensionContext) -> Fallible {
        self.call(context)
    }
}

impl AfterAllCallback for LifecycleMethod {
    fn after_all(&self, context: &ExtensionContext) -> Fallible {
        self.call(context)
    }
}

impl BeforeEachCallback for LifecycleMethod {
    fn before_each(&self, context: &ExtensionContext) -> Fallible {
        self.call(context)
    }
}

impl AfterEachCallback for LifecycleMethod {
    fn after_each(&self, context: &ExtensionContext) -> Fallible {
        self.call(context)
    }
}

/// Register every lifecycle method `class` declares, in declaration order.
///
/// `BeforeAll`/`AfterAll` methods must be static and only apply to `class` itself; `BeforeEach`/`AfterEach`
/// methods must be instance methods and are inherited by nested classes.
pub(crate) fn register_lifecycle_methods(
    registry: &mut ExtensionRegistry,
    class: &Rc<TestClass>,
    classifier: &dyn Classifier,
    invoker: &Rc<dyn Invoker>,
) -> Fallible {
    for method in class.methods() {
        let Some(role) = classifier.lifecycle_role(method) else {
            continue;
        };
        let needs_static = matches!(role, LifecycleRole::BeforeAll | LifecycleRole::AfterAll);
        if method.is_static() != needs_static {
            let expected = if needs_static { "static" } else { "an instance method" };
            return Err(Failure::configuration(format!(
                "{role:?} method '{}#{}' must be {expected}",
                class.name(),
                method.signature()
            )));
        }
        let callback = Rc::new(LifecycleMethod {
            class: Rc::clone(class),
            method: Rc::clone(method),
            invoker: Rc::clone(invoker),
        });
        let (point, scope) = match role {
            LifecycleRole::BeforeAll => (ExtensionPoint::BeforeAll(callback), RegistrationScope::NodeLocal),
            LifecycleRole::AfterAll => (ExtensionPoint::AfterAll(callback), RegistrationScope::NodeLocal),
            LifecycleRole::BeforeEach => (ExtensionPoint::BeforeEach(callback), RegistrationScope::Inherited),
            LifecycleRole::AfterEach => (ExtensionPoint::AfterEach(callback), RegistrationScope::Inherited),
        };
        let source = RegistrationSource::Method {
            class_name: class.name().to_string(),
            method_name: method.name().to_string(),
        };
        registry.register_point(point, Position::Default, source, scope);
    }
    Ok(())
}
