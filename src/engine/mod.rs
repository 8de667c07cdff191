//! The trellis test engine: discovery through [`SpecificationResolver`], execution through a
//! hierarchical walk of the resulting tree.
//!
//! ## Modules
//!
//! - `node` - per-node lifecycle (prepare, skip check, before, execute, after)
//! - `executor` - depth-first walk, exception collection and listener notification
//! - `lifecycle` - lifecycle methods registered as callbacks
//! - `invocation` - method invocation with parameter resolution

mod executor;
mod invocation;
mod lifecycle;
mod node;

pub use invocation::MethodInvoker;
pub use node::TrellisNode;

use std::rc::Rc;

use tracing::info;

use crate::descriptor::{TestDescriptor, TestTree};
use crate::launcher::{DiscoveredTests, EngineExecutionListener, TestEngine};
use crate::model::{ClassSource, Classifier, DefaultInvoker, Invoker, MarkerClassifier};
use crate::resolver::{SpecificationResolver, TestPlanSpecification};
use executor::HierarchicalExecutor;
use node::Environment;

/// Id of the engine; the engine part of every unique id it produces.
pub const ENGINE_ID: &str = "trellis";

/// The class-based test engine.
pub struct TrellisEngine {
    source: Rc<dyn ClassSource>,
    classifier: Rc<dyn Classifier>,
    invoker: Rc<dyn Invoker>,
}

impl TrellisEngine {
    /// An engine discovering classes from `source`, classified by markers.
    pub fn new(source: Rc<dyn ClassSource>) -> Self {
        Self {
            source,
            classifier: Rc::new(MarkerClassifier),
            invoker: Rc::new(DefaultInvoker),
        }
    }

    pub fn with_classifier(mut self, classifier: Rc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_invoker(mut self, invoker: Rc<dyn Invoker>) -> Self {
        self.invoker = invoker;
        self
    }

    /// Resolve `specification` into a tree without wrapping it for execution.
    pub fn resolve(&self, specification: &TestPlanSpecification) -> TestTree<TrellisNode> {
        SpecificationResolver::new(ENGINE_ID, self.source.as_ref(), self.classifier.as_ref()).resolve(specification)
    }
}

impl TestEngine for TrellisEngine {
    fn id(&self) -> &str {
        ENGINE_ID
    }

    fn discover(&self, specification: &TestPlanSpecification) -> Box<dyn DiscoveredTests> {
        Box::new(DiscoveredTree {
            tree: self.resolve(specification),
            env: Environment {
                classifier: Rc::clone(&self.classifier),
                invoker: Rc::clone(&self.invoker),
            },
        })
    }
}

/// A resolved tree ready to run.
struct DiscoveredTree {
    tree: TestTree<TrellisNode>,
    env: Environment,
}

impl DiscoveredTests for DiscoveredTree {
    fn root(&self) -> &TestDescriptor {
        self.tree.descriptor(self.tree.root())
    }

    fn descriptors(&self) -> Vec<&TestDescriptor> {
        self.tree
            .descendants(self.tree.root())
            .into_iter()
            .map(|id| self.tree.descriptor(id))
            .collect()
    }

    fn execute(mut self: Box<Self>, listener: &mut dyn EngineExecutionListener) {
        info!(engine = ENGINE_ID, nodes = self.tree.len(), "executing discovered tests");
        let env = self.env.clone();
        HierarchicalExecutor::new(&mut self.tree, env, listener).execute();
    }
}
