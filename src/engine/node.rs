//! Per-node lifecycle behavior.
//!
//! Every descriptor in the tree carries a [`TrellisNode`] payload. The executor drives each payload
//! through the same phases:
//!
//! ```text
//! prepare -> should_be_skipped -> before -> execute -> (children) -> after
//! ```
//!
//! `prepare` builds the node's registry and context from its parent's; `after` always runs once `prepare`
//! and the skip check succeeded.

use std::rc::Rc;

use trellis_core::{Fallible, Failure, ThrowableCollector, catch};

use super::MethodInvoker;
use super::lifecycle::register_lifecycle_methods;
use crate::descriptor::TestDescriptor;
use crate::extension::{
    AfterAllCallback, AfterEachCallback, ApplicationOrder, BeforeAllCallback, BeforeEachCallback, ConditionEvaluation,
    ContextKind, DisabledCondition, Element, ExecutionCondition, ExtensionContext, ExtensionPoint, ExtensionRegistry,
    Position, RegistrationScope, RegistrationSource, TestInfoResolver, TestInstancePostProcessor, TestInstances,
};
use crate::model::{Classifier, DynamicTest, Instance, Invoker, TestClass, TestMethod};

/// Collaborators shared by all nodes of one execution.
#[derive(Clone)]
pub(crate) struct Environment {
    pub classifier: Rc<dyn Classifier>,
    pub invoker: Rc<dyn Invoker>,
}

/// Registry and context of a prepared node.
#[derive(Clone)]
pub(crate) struct ExecutionState {
    pub registry: Rc<ExtensionRegistry>,
    pub context: Rc<ExtensionContext>,
}

/// Engine payload of a descriptor.
#[derive(Debug, Clone)]
pub enum TrellisNode {
    Engine,
    Class {
        class: Rc<TestClass>,
        /// Enclosing classes, outermost first.
        enclosing: Vec<Rc<TestClass>>,
    },
    Method {
        class: Rc<TestClass>,
        enclosing: Vec<Rc<TestClass>>,
        method: Rc<TestMethod>,
        factory: bool,
    },
    Dynamic {
        factory: Rc<TestMethod>,
        test: DynamicTest,
    },
}

/// The lifecycle contract the executor relies on.
pub(crate) trait Node {
    fn prepare(
        &self,
        env: &Environment,
        parent: Option<&ExecutionState>,
        descriptor: &TestDescriptor,
    ) -> Fallible<ExecutionState>;

    /// `Some(reason)` when a condition disables the node.
    fn should_be_skipped(&self, state: &ExecutionState) -> Fallible<Option<String>>;

    fn before(&self, env: &Environment, state: &ExecutionState) -> Fallible;

    /// Run the node's own body. Test factories return the dynamic tests they produced.
    fn execute(&self, env: &Environment, state: &ExecutionState) -> Fallible<Vec<DynamicTest>>;

    /// Run teardown callbacks, recording every failure into `collector`.
    fn after(&self, state: &ExecutionState, collector: &mut ThrowableCollector);
}

impl Node for TrellisNode {
    fn prepare(
        &self,
        env: &Environment,
        parent: Option<&ExecutionState>,
        descriptor: &TestDescriptor,
    ) -> Fallible<ExecutionState> {
        match (self, parent) {
            (TrellisNode::Engine, _) => Ok(prepare_engine(descriptor)),
            (_, None) => Err(Failure::configuration(format!(
                "'{}' cannot be executed without its parent",
                descriptor.unique_id()
            ))),
            (TrellisNode::Class { class, .. }, Some(parent)) => prepare_class(env, parent, descriptor, class),
            (
                TrellisNode::Method {
                    class,
                    enclosing,
                    method,
                    ..
                },
                Some(parent),
            ) => prepare_method(env, parent, descriptor, class, enclosing, method),
            (TrellisNode::Dynamic { factory, test }, Some(parent)) => {
                let context = child_context(
                    parent,
                    descriptor,
                    ContextKind::Test,
                    Element::Dynamic {
                        factory: Rc::clone(factory),
                        display_name: test.display_name().to_string(),
                    },
                );
                context.attach_registry(Rc::clone(&parent.registry));
                Ok(ExecutionState {
                    registry: Rc::clone(&parent.registry),
                    context,
                })
            }
        }
    }

    fn should_be_skipped(&self, state: &ExecutionState) -> Fallible<Option<String>> {
        for registered in state.registry.points::<dyn ExecutionCondition>(ApplicationOrder::Forward) {
            let _active = state.context.activate(registered.owner);
            let evaluation = catch(|| Ok(registered.callback.evaluate(&state.context)))?;
            if let ConditionEvaluation::Disabled(reason) = evaluation {
                return Ok(Some(reason));
            }
        }
        Ok(None)
    }

    fn before(&self, _env: &Environment, state: &ExecutionState) -> Fallible {
        let context = &state.context;
        match self {
            TrellisNode::Engine | TrellisNode::Dynamic { .. } => Ok(()),
            TrellisNode::Class { .. } => {
                for registered in state.registry.points::<dyn BeforeAllCallback>(ApplicationOrder::Forward) {
                    let _active = context.activate(registered.owner);
                    registered.callback.before_all(context)?;
                }
                Ok(())
            }
            TrellisNode::Method { .. } => {
                for registered in state.registry.points::<dyn BeforeEachCallback>(ApplicationOrder::Forward) {
                    let _active = context.activate(registered.owner);
                    registered.callback.before_each(context)?;
                }
                Ok(())
            }
        }
    }

    fn execute(&self, env: &Environment, state: &ExecutionState) -> Fallible<Vec<DynamicTest>> {
        match self {
            TrellisNode::Engine | TrellisNode::Class { .. } => Ok(Vec::new()),
            TrellisNode::Dynamic { test, .. } => test.run().map(|()| Vec::new()),
            TrellisNode::Method {
                class, method, factory, ..
            } => {
                let instance = state.context.test_instance();
                let result = MethodInvoker::new(&state.registry, env.invoker.as_ref()).invoke(
                    class,
                    method,
                    instance.as_ref(),
                    &state.context,
                )?;
                if !factory {
                    return Ok(Vec::new());
                }
                result
                    .and_then(|value| value.downcast::<Vec<DynamicTest>>().ok())
                    .map(|tests| tests.as_ref().clone())
                    .ok_or_else(|| {
                        Failure::configuration(format!(
                            "test factory '{}#{}' must return a Vec<DynamicTest>",
                            class.name(),
                            method.signature()
                        ))
                    })
            }
        }
    }

    fn after(&self, state: &ExecutionState, collector: &mut ThrowableCollector) {
        let context = &state.context;
        match self {
            TrellisNode::Engine | TrellisNode::Dynamic { .. } => {}
            TrellisNode::Class { .. } => {
                for registered in state.registry.points::<dyn AfterAllCallback>(ApplicationOrder::Backward) {
                    let _active = context.activate(registered.owner);
                    collector.execute(|| registered.callback.after_all(context));
                }
            }
            TrellisNode::Method { .. } => {
                for registered in state.registry.points::<dyn AfterEachCallback>(ApplicationOrder::Backward) {
                    let _active = context.activate(registered.owner);
                    collector.execute(|| registered.callback.after_each(context));
                }
            }
        }
    }
}

fn child_context(
    parent: &ExecutionState,
    descriptor: &TestDescriptor,
    kind: ContextKind,
    element: Element,
) -> Rc<ExtensionContext> {
    Rc::new(ExtensionContext::new(
        Some(Rc::clone(&parent.context)),
        descriptor.unique_id().clone(),
        descriptor.display_name(),
        kind,
        element,
        descriptor.tags().to_vec(),
    ))
}

fn prepare_engine(descriptor: &TestDescriptor) -> ExecutionState {
    let mut registry = ExtensionRegistry::new();
    registry.register_point(
        ExtensionPoint::Condition(Rc::new(DisabledCondition)),
        Position::Default,
        RegistrationSource::Builtin("DisabledCondition"),
        RegistrationScope::Inherited,
    );
    registry.register_point(
        ExtensionPoint::ParameterResolver(Rc::new(TestInfoResolver)),
        Position::Default,
        RegistrationSource::Builtin("TestInfoResolver"),
        RegistrationScope::Inherited,
    );
    let registry = Rc::new(registry);
    let context = Rc::new(ExtensionContext::new(
        None,
        descriptor.unique_id().clone(),
        descriptor.display_name(),
        ContextKind::Engine,
        Element::Engine,
        descriptor.tags().to_vec(),
    ));
    context.attach_registry(Rc::clone(&registry));
    ExecutionState { registry, context }
}

fn prepare_class(
    env: &Environment,
    parent: &ExecutionState,
    descriptor: &TestDescriptor,
    class: &Rc<TestClass>,
) -> Fallible<ExecutionState> {
    let mut registry = ExtensionRegistry::new_from(&parent.registry);
    for declaration in class.extensions() {
        registry.register_extension(declaration);
    }
    register_lifecycle_methods(&mut registry, class, env.classifier.as_ref(), &env.invoker)?;

    let registry = Rc::new(registry);
    let context = child_context(parent, descriptor, ContextKind::Container, Element::Class(Rc::clone(class)));
    context.attach_registry(Rc::clone(&registry));
    Ok(ExecutionState { registry, context })
}

fn prepare_method(
    env: &Environment,
    parent: &ExecutionState,
    descriptor: &TestDescriptor,
    class: &Rc<TestClass>,
    enclosing: &[Rc<TestClass>],
    method: &Rc<TestMethod>,
) -> Fallible<ExecutionState> {
    let mut registry = ExtensionRegistry::new_from(&parent.registry);
    for declaration in method.extensions() {
        registry.register_extension(declaration);
    }
    let registry = Rc::new(registry);
    let context = child_context(
        parent,
        descriptor,
        ContextKind::Test,
        Element::Method {
            class: Rc::clone(class),
            method: Rc::clone(method),
        },
    );
    context.attach_registry(Rc::clone(&registry));

    // every test gets a fresh instance chain
    let mut instances = TestInstances::new();
    let mut outer: Option<Instance> = None;
    for declaring in enclosing.iter().chain(std::iter::once(class)) {
        let instance = declaring.instantiate(outer.as_ref())?;
        instances.push(declaring.name(), Rc::clone(&instance));
        outer = Some(instance);
    }
    context.set_test_instances(instances.clone());

    for registered in registry.points::<dyn TestInstancePostProcessor>(ApplicationOrder::Forward) {
        let _active = context.activate(registered.owner);
        for instance in instances.all() {
            registered.callback.post_process(instance, &context)?;
        }
    }
    Ok(ExecutionState { registry, context })
}
