//! Depth-first execution of a descriptor tree.

use std::rc::Rc;

use tracing::{debug, debug_span};
use trellis_core::ThrowableCollector;

use super::node::{Environment, ExecutionState, Node, TrellisNode};
use crate::descriptor::{DescriptorType, NodeId, TestDescriptor, TestSource, TestTree};
use crate::launcher::{EngineExecutionListener, TestExecutionResult};
use crate::model::DynamicTest;

/// Walks a tree, driving every node through its lifecycle and reporting to a listener.
///
/// Nothing a node raises escapes: every failure ends up in the node's `finished` result. Siblings run
/// regardless of each other's outcome; a failed `prepare`, skip check or `before` keeps the node's children
/// from being started.
pub(crate) struct HierarchicalExecutor<'a> {
    tree: &'a mut TestTree<TrellisNode>,
    env: Environment,
    listener: &'a mut dyn EngineExecutionListener,
}

impl<'a> HierarchicalExecutor<'a> {
    pub fn new(
        tree: &'a mut TestTree<TrellisNode>,
        env: Environment,
        listener: &'a mut dyn EngineExecutionListener,
    ) -> Self {
        Self { tree, env, listener }
    }

    #[tracing::instrument(skip_all, fields(root = %self.tree.descriptor(self.tree.root()).unique_id()))]
    pub fn execute(mut self) {
        let root = self.tree.root();
        self.execute_node(root, None);
    }

    fn execute_node(&mut self, id: NodeId, parent: Option<&ExecutionState>) {
        let descriptor = self.tree.descriptor(id).clone();
        let node = self.tree.node(id).clone();
        let span = debug_span!("node", id = %descriptor.unique_id());
        let _entered = span.enter();

        let mut collector = ThrowableCollector::new();
        let state = collector.execute_returning(|| node.prepare(&self.env, parent, &descriptor));
        let skip_reason = state
            .as_ref()
            .and_then(|state| collector.execute_returning(|| node.should_be_skipped(state)))
            .flatten();
        if let Some(reason) = skip_reason {
            debug!(%reason, "skipped");
            self.listener.execution_skipped(&descriptor, &reason);
            return;
        }

        self.listener.execution_started(&descriptor);
        if let Some(state) = state.as_ref().filter(|_| collector.is_empty()) {
            collector.execute(|| node.before(&self.env, state));
            if collector.is_empty() {
                let dynamic = collector
                    .execute_returning(|| node.execute(&self.env, state))
                    .unwrap_or_default();
                for child in self.tree.children(id).to_vec() {
                    self.execute_node(child, Some(state));
                }
                self.execute_dynamic_tests(id, &node, dynamic, state);
            }
            node.after(state, &mut collector);
        }

        let result = TestExecutionResult::from_failure(collector.into_primary());
        debug!(status = ?result.status(), "finished");
        self.listener.execution_finished(&descriptor, &result);
    }

    fn execute_dynamic_tests(
        &mut self,
        parent: NodeId,
        node: &TrellisNode,
        tests: Vec<DynamicTest>,
        state: &ExecutionState,
    ) {
        let TrellisNode::Method { method, .. } = node else {
            return;
        };
        for (index, test) in tests.into_iter().enumerate() {
            let parent_descriptor = self.tree.descriptor(parent);
            let factory = match parent_descriptor.source() {
                Some(source) => source.to_string(),
                None => parent_descriptor.unique_id().to_string(),
            };
            let descriptor = TestDescriptor::new(
                parent_descriptor.unique_id().append(format!("[{}]", index + 1)),
                test.display_name(),
                DescriptorType::Test,
            )
            .with_source(TestSource::Dynamic {
                factory,
                index: index + 1,
            });
            let child = self.tree.add_child(
                parent,
                descriptor,
                TrellisNode::Dynamic {
                    factory: Rc::clone(method),
                    test,
                },
            );
            self.listener.dynamic_test_registered(self.tree.descriptor(child));
            self.execute_node(child, Some(state));
        }
    }
}
