//! Ordered extension registrations, one registry per executing node.
//!
//! A child registry starts as a copy of its parent's inherited registrations and appends whatever its
//! own element declares. Registration order is therefore always ancestor-first.
//!
//! Iteration order is decided by two axes:
//! - [`Position`]: every `Outermost` registration comes before every `Default` one, which come before
//!   every `Innermost` one
//! - declaration depth: within one position, registration order (ancestor first)
//!
//! [`ApplicationOrder::Backward`] is the exact reverse of [`ApplicationOrder::Forward`], so the last
//! "before" callback to run is always the first "after" callback to run.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::api::{
    AfterAllCallback, AfterEachCallback, BeforeAllCallback, BeforeEachCallback, ExecutionCondition,
    ParameterResolver, TestInstancePostProcessor,
};
use super::{ExtensionDecl, ExtensionId};

/// Placement of a registration relative to declaration-ordered ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub enum Position {
    /// Furthest from the test: first before, last after.
    Outermost,
    #[default]
    Default,
    /// Closest to the test: last before, first after.
    Innermost,
}

/// Direction in which registrations of one capability are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationOrder {
    /// Setup-style callbacks.
    Forward,
    /// Teardown-style callbacks.
    Backward,
}

/// Whether child registries inherit a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationScope {
    Inherited,
    /// Only applies to the node that registered it.
    NodeLocal,
}

/// Who registered a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationSource {
    Builtin(&'static str),
    Extension(String),
    /// A lifecycle method declared on a class.
    Method { class_name: String, method_name: String },
}

impl fmt::Display for RegistrationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(name) => f.write_str(name),
            Self::Extension(name) => f.write_str(name),
            Self::Method { class_name, method_name } => write!(f, "{class_name}#{method_name}"),
        }
    }
}

/// The capabilities a registration can provide.
#[derive(Clone)]
pub enum ExtensionPoint {
    BeforeAll(Rc<dyn BeforeAllCallback>),
    AfterAll(Rc<dyn AfterAllCallback>),
    BeforeEach(Rc<dyn BeforeEachCallback>),
    AfterEach(Rc<dyn AfterEachCallback>),
    Condition(Rc<dyn ExecutionCondition>),
    ParameterResolver(Rc<dyn ParameterResolver>),
    PostProcessor(Rc<dyn TestInstancePostProcessor>),
}

impl ExtensionPoint {
    pub fn kind(&self) -> ExtensionPointKind {
        match self {
            Self::BeforeAll(_) => ExtensionPointKind::BeforeAll,
            Self::AfterAll(_) => ExtensionPointKind::AfterAll,
            Self::BeforeEach(_) => ExtensionPointKind::BeforeEach,
            Self::AfterEach(_) => ExtensionPointKind::AfterEach,
            Self::Condition(_) => ExtensionPointKind::Condition,
            Self::ParameterResolver(_) => ExtensionPointKind::ParameterResolver,
            Self::PostProcessor(_) => ExtensionPointKind::PostProcessor,
        }
    }
}

impl fmt::Debug for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtensionPoint::{:?}", self.kind())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionPointKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
    Condition,
    ParameterResolver,
    PostProcessor,
}

/// Maps a capability trait object type to its [`ExtensionPoint`] variant.
pub trait Capability {
    fn extract(point: &ExtensionPoint) -> Option<Rc<Self>>;
}

macro_rules! capability {
    ($trait:ident => $variant:ident) => {
        impl Capability for dyn $trait {
            fn extract(point: &ExtensionPoint) -> Option<Rc<Self>> {
                match point {
                    ExtensionPoint::$variant(callback) => Some(Rc::clone(callback)),
                    _ => None,
                }
            }
        }
    };
}

capability!(BeforeAllCallback => BeforeAll);
capability!(AfterAllCallback => AfterAll);
capability!(BeforeEachCallback => BeforeEach);
capability!(AfterEachCallback => AfterEach);
capability!(ExecutionCondition => Condition);
capability!(ParameterResolver => ParameterResolver);
capability!(TestInstancePostProcessor => PostProcessor);

/// One registered callback.
#[derive(Debug, Clone)]
pub struct Registration {
    pub point: ExtensionPoint,
    pub position: Position,
    pub owner: ExtensionId,
    pub source: RegistrationSource,
    pub scope: RegistrationScope,
}

/// A callback of capability `C`, with the identity it runs under.
pub struct Registered<C: ?Sized> {
    pub callback: Rc<C>,
    pub owner: ExtensionId,
    pub source: RegistrationSource,
}

/// Ordered registrations for one node.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    registrations: Vec<Registration>,
    declared: HashSet<String>,
    next_id: u32,
}

impl ExtensionRegistry {
    /// An empty root registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A child registry inheriting `parent`'s inherited registrations and declared extension names.
    pub fn new_from(parent: &ExtensionRegistry) -> Self {
        Self {
            registrations: parent
                .registrations
                .iter()
                .filter(|r| r.scope == RegistrationScope::Inherited)
                .cloned()
                .collect(),
            declared: parent.declared.clone(),
            next_id: parent.next_id,
        }
    }

    fn allocate_id(&mut self) -> ExtensionId {
        let id = ExtensionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Instantiate and register a declared extension.
    ///
    /// Returns `false` when an extension of the same name is already registered on this chain.
    pub fn register_extension(&mut self, declaration: &ExtensionDecl) -> bool {
        if !self.declared.insert(declaration.name().to_string()) {
            debug!(extension = declaration.name(), "extension already registered on this chain");
            return false;
        }
        let owner = self.allocate_id();
        let extension = declaration.instantiate();
        let mut registrar = Registrar {
            registry: self,
            owner,
            source: RegistrationSource::Extension(declaration.name().to_string()),
        };
        extension.register(&mut registrar);
        debug!(extension = declaration.name(), owner = owner.value(), "registered extension");
        true
    }

    /// Register a single callback under its own identity.
    pub fn register_point(
        &mut self,
        point: ExtensionPoint,
        position: Position,
        source: RegistrationSource,
        scope: RegistrationScope,
    ) -> ExtensionId {
        let owner = self.allocate_id();
        self.registrations.push(Registration {
            point,
            position,
            owner,
            source,
            scope,
        });
        owner
    }

    /// All callbacks of capability `C` in application order.
    pub fn points<C: Capability + ?Sized>(&self, order: ApplicationOrder) -> Vec<Registered<C>> {
        let mut found: Vec<(Position, Registered<C>)> = self
            .registrations
            .iter()
            .filter_map(|r| {
                C::extract(&r.point).map(|callback| {
                    (
                        r.position,
                        Registered {
                            callback,
                            owner: r.owner,
                            source: r.source.clone(),
                        },
                    )
                })
            })
            .collect();
        // stable: registration order is kept within a position
        found.sort_by_key(|(position, _)| *position);
        let mut ordered: Vec<Registered<C>> = found.into_iter().map(|(_, registered)| registered).collect();
        if order == ApplicationOrder::Backward {
            ordered.reverse();
        }
        ordered
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
    }
}

/// Handed to [`Extension::register`](super::Extension::register); every registration made through one
/// registrar shares the extension's identity, so they also share its store entries.
pub struct Registrar<'a> {
    registry: &'a mut ExtensionRegistry,
    owner: ExtensionId,
    source: RegistrationSource,
}

impl Registrar<'_> {
    pub fn register(&mut self, point: ExtensionPoint, position: Position) -> &mut Self {
        self.registry.registrations.push(Registration {
            point,
            position,
            owner: self.owner,
            source: self.source.clone(),
            scope: RegistrationScope::Inherited,
        });
        self
    }

    pub fn before_all(&mut self, callback: Rc<dyn BeforeAllCallback>) -> &mut Self {
        self.register(ExtensionPoint::BeforeAll(callback), Position::Default)
    }

    pub fn after_all(&mut self, callback: Rc<dyn AfterAllCallback>) -> &mut Self {
        self.register(ExtensionPoint::AfterAll(callback), Position::Default)
    }

    pub fn before_each(&mut self, callback: Rc<dyn BeforeEachCallback>) -> &mut Self {
        self.register(ExtensionPoint::BeforeEach(callback), Position::Default)
    }

    pub fn after_each(&mut self, callback: Rc<dyn AfterEachCallback>) -> &mut Self {
        self.register(ExtensionPoint::AfterEach(callback), Position::Default)
    }

    pub fn condition(&mut self, condition: Rc<dyn ExecutionCondition>) -> &mut Self {
        self.register(ExtensionPoint::Condition(condition), Position::Default)
    }

    pub fn parameter_resolver(&mut self, resolver: Rc<dyn ParameterResolver>) -> &mut Self {
        self.register(ExtensionPoint::ParameterResolver(resolver), Position::Default)
    }

    pub fn post_processor(&mut self, processor: Rc<dyn TestInstancePostProcessor>) -> &mut Self {
        self.register(ExtensionPoint::PostProcessor(processor), Position::Default)
    }

    pub fn owner(&self) -> ExtensionId {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{Extension, ExtensionContext};
    use std::cell::RefCell;
    use trellis_core::Fallible;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logger(log: &Log, label: &str) -> Rc<dyn BeforeEachCallback> {
        let log = Rc::clone(log);
        let label = label.to_string();
        Rc::new(move |_: &ExtensionContext| -> Fallible {
            log.borrow_mut().push(label.clone());
            Ok(())
        })
    }

    fn labels(registry: &ExtensionRegistry, order: ApplicationOrder) -> Vec<String> {
        registry
            .points::<dyn BeforeEachCallback>(order)
            .iter()
            .map(|r| r.source.to_string())
            .collect()
    }

    fn add(registry: &mut ExtensionRegistry, log: &Log, name: &str, position: Position) {
        registry.register_point(
            ExtensionPoint::BeforeEach(logger(log, name)),
            position,
            RegistrationSource::Extension(name.to_string()),
            RegistrationScope::Inherited,
        );
    }

    #[test]
    fn test_forward_and_backward_are_mirrors() {
        let log: Log = Rc::default();
        let mut parent = ExtensionRegistry::new();
        add(&mut parent, &log, "outer", Position::Default);
        add(&mut parent, &log, "innermost", Position::Innermost);
        let mut child = ExtensionRegistry::new_from(&parent);
        add(&mut child, &log, "inner", Position::Default);
        add(&mut child, &log, "outermost", Position::Outermost);

        assert_eq!(
            labels(&child, ApplicationOrder::Forward),
            vec!["outermost", "outer", "inner", "innermost"]
        );
        assert_eq!(
            labels(&child, ApplicationOrder::Backward),
            vec!["innermost", "inner", "outer", "outermost"]
        );
    }

    #[test]
    fn test_node_local_registrations_are_not_inherited() {
        let log: Log = Rc::default();
        let mut parent = ExtensionRegistry::new();
        parent.register_point(
            ExtensionPoint::BeforeEach(logger(&log, "local")),
            Position::Default,
            RegistrationSource::Builtin("local"),
            RegistrationScope::NodeLocal,
        );
        add(&mut parent, &log, "inherited", Position::Default);
        let child = ExtensionRegistry::new_from(&parent);
        assert_eq!(labels(&child, ApplicationOrder::Forward), vec!["inherited"]);
    }

    #[test]
    fn test_other_capabilities_are_filtered_out() {
        let mut registry = ExtensionRegistry::new();
        let condition: Rc<dyn ExecutionCondition> =
            Rc::new(|_: &ExtensionContext| crate::extension::ConditionEvaluation::Enabled);
        registry.register_point(
            ExtensionPoint::Condition(condition),
            Position::Default,
            RegistrationSource::Builtin("condition"),
            RegistrationScope::Inherited,
        );
        assert!(registry.points::<dyn BeforeEachCallback>(ApplicationOrder::Forward).is_empty());
        assert_eq!(registry.points::<dyn ExecutionCondition>(ApplicationOrder::Forward).len(), 1);
    }

    struct Both {
        log: Log,
    }

    impl BeforeEachCallback for Both {
        fn before_each(&self, _: &ExtensionContext) -> Fallible {
            self.log.borrow_mut().push("before".into());
            Ok(())
        }
    }

    impl AfterEachCallback for Both {
        fn after_each(&self, _: &ExtensionContext) -> Fallible {
            self.log.borrow_mut().push("after".into());
            Ok(())
        }
    }

    impl Extension for Both {
        fn register(self: Rc<Self>, registrar: &mut Registrar<'_>) {
            registrar.before_each(self.clone()).after_each(self);
        }
    }

    #[test]
    fn test_declared_extension_shares_one_owner_and_is_deduplicated() {
        let log: Log = Rc::default();
        let shared = Rc::clone(&log);
        let declaration = ExtensionDecl::new("Both", move || Rc::new(Both { log: Rc::clone(&shared) }));

        let mut parent = ExtensionRegistry::new();
        assert!(parent.register_extension(&declaration));
        let mut child = ExtensionRegistry::new_from(&parent);
        assert!(!child.register_extension(&declaration));

        let owners: Vec<ExtensionId> = child.registrations().iter().map(|r| r.owner).collect();
        assert_eq!(owners.len(), 2);
        assert_eq!(owners[0], owners[1]);
        assert!(child.is_declared("Both"));
    }
}
