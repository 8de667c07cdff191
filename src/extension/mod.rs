//! The extension model.
//!
//! Extensions are independently-authored callback objects. Classes and methods declare them with
//! [`ExtensionDecl`]s; the engine instantiates each declaration once per ancestor chain and lets it
//! register any mix of capabilities (see [`api`]) through a [`Registrar`].
//!
//! ## Notes
//!
//! - Ordering and scoping of registrations live in [`registry`].
//! - Shared state between callbacks of one extension lives in the [`ExtensionContext`] store.

pub mod api;
mod builtin;
mod context;
pub mod registry;

pub use api::{
    AfterAllCallback, AfterEachCallback, BeforeAllCallback, BeforeEachCallback, ConditionEvaluation,
    ExecutionCondition, ParameterContext, ParameterResolver, TestInstancePostProcessor,
};
pub use builtin::{DisabledCondition, TestInfo, TestInfoResolver};
pub use context::{
    ActiveExtension, ContextError, ContextKind, Element, ExtensionContext, ExtensionId, TestInstances, Visibility,
};
pub use registry::{
    ApplicationOrder, ExtensionPoint, ExtensionRegistry, Position, Registered, Registrar, RegistrationScope,
    RegistrationSource,
};

use std::fmt;
use std::rc::Rc;

/// A callback object that registers one or more capabilities.
pub trait Extension {
    fn register(self: Rc<Self>, registrar: &mut Registrar<'_>);
}

/// A declared extension: a name (used for deduplication) and a way to instantiate it.
#[derive(Clone)]
pub struct ExtensionDecl {
    name: String,
    factory: Rc<dyn Fn() -> Rc<dyn Extension>>,
}

impl ExtensionDecl {
    pub fn new<E: Extension + 'static>(name: impl Into<String>, factory: impl Fn() -> Rc<E> + 'static) -> Self {
        Self {
            name: name.into(),
            factory: Rc::new(move || factory() as Rc<dyn Extension>),
        }
    }

    /// Declare `E`, named after its type and built with `E::default()`.
    pub fn of<E: Extension + Default + 'static>() -> Self {
        Self::new(std::any::type_name::<E>(), || Rc::new(E::default()))
    }

    /// Declare an already-built extension; every instantiation shares it.
    pub fn shared<E: Extension + 'static>(name: impl Into<String>, extension: Rc<E>) -> Self {
        Self::new(name, move || Rc::clone(&extension))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instantiate(&self) -> Rc<dyn Extension> {
        (self.factory)()
    }
}

impl fmt::Debug for ExtensionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionDecl").field("name", &self.name).finish()
    }
}
