//! Capability interfaces an extension can implement.
//!
//! Every capability takes the [`ExtensionContext`] of the node being executed. Plain closures implement
//! the callback capabilities, so `Rc::new(|ctx: &ExtensionContext| -> Fallible { .. })` can be registered
//! directly.

use trellis_core::Fallible;

use super::ExtensionContext;
use crate::model::{Instance, Parameter, TestMethod, Value};

/// Runs once before a container's children.
pub trait BeforeAllCallback {
    fn before_all(&self, context: &ExtensionContext) -> Fallible;
}

/// Runs once after a container's children, even if they failed.
pub trait AfterAllCallback {
    fn after_all(&self, context: &ExtensionContext) -> Fallible;
}

/// Runs before every test.
pub trait BeforeEachCallback {
    fn before_each(&self, context: &ExtensionContext) -> Fallible;
}

/// Runs after every test, even if it failed.
pub trait AfterEachCallback {
    fn after_each(&self, context: &ExtensionContext) -> Fallible;
}

/// Outcome of an [`ExecutionCondition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionEvaluation {
    Enabled,
    Disabled(String),
}

impl ConditionEvaluation {
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self::Disabled(reason.into())
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled(_))
    }
}

/// Decides whether a container or test runs at all. Evaluated for every node.
pub trait ExecutionCondition {
    fn evaluate(&self, context: &ExtensionContext) -> ConditionEvaluation;
}

/// The parameter being resolved and the method declaring it.
#[derive(Debug, Clone, Copy)]
pub struct ParameterContext<'a> {
    pub parameter: &'a Parameter,
    pub index: usize,
    pub method: &'a TestMethod,
    pub class_name: &'a str,
}

impl ParameterContext<'_> {
    pub fn type_name(&self) -> &str {
        &self.parameter.type_name
    }
}

/// Supplies argument values for test and lifecycle method parameters.
pub trait ParameterResolver {
    fn supports(&self, parameter: &ParameterContext<'_>, context: &ExtensionContext) -> Fallible<bool>;

    fn resolve(&self, parameter: &ParameterContext<'_>, context: &ExtensionContext) -> Fallible<Value>;
}

/// Sees each freshly created test instance before any callback runs against it.
pub trait TestInstancePostProcessor {
    fn post_process(&self, instance: &Instance, context: &ExtensionContext) -> Fallible;
}

impl<F: Fn(&ExtensionContext) -> Fallible> BeforeAllCallback for F {
    fn before_all(&self, context: &ExtensionContext) -> Fallible {
        self(context)
    }
}

impl<F: Fn(&ExtensionContext) -> Fallible> AfterAllCallback for F {
    fn after_all(&self, context: &ExtensionContext) -> Fallible {
        self(context)
    }
}

impl<F: Fn(&ExtensionContext) -> Fallible> BeforeEachCallback for F {
    fn before_each(&self, context: &ExtensionContext) -> Fallible {
        self(context)
    }
}

impl<F: Fn(&ExtensionContext) -> Fallible> AfterEachCallback for F {
    fn after_each(&self, context: &ExtensionContext) -> Fallible {
        self(context)
    }
}

impl<F: Fn(&ExtensionContext) -> ConditionEvaluation> ExecutionCondition for F {
    fn evaluate(&self, context: &ExtensionContext) -> ConditionEvaluation {
        self(context)
    }
}

impl<F: Fn(&Instance, &ExtensionContext) -> Fallible> TestInstancePostProcessor for F {
    fn post_process(&self, instance: &Instance, context: &ExtensionContext) -> Fallible {
        self(instance, context)
    }
}
