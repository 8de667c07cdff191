//! Execution events: the engine-level protocol, the plan-level protocol and the adapter between them.

use trellis_core::Failure;

use super::{TestIdentifier, TestPlan};
use crate::descriptor::TestDescriptor;

/// Outcome of an executed node.
#[derive(Debug, Clone, PartialEq)]
pub enum TestExecutionResult {
    Successful,
    /// An assumption failed; counted separately from failures.
    Aborted(Failure),
    Failed(Failure),
}

/// The outcome without its failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Successful,
    Aborted,
    Failed,
}

impl TestExecutionResult {
    /// Classify the primary failure of a node, if any.
    pub fn from_failure(failure: Option<Failure>) -> Self {
        match failure {
            None => Self::Successful,
            Some(failure) if failure.is_aborted() => Self::Aborted(failure),
            Some(failure) => Self::Failed(failure),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Successful => Status::Successful,
            Self::Aborted(_) => Status::Aborted,
            Self::Failed(_) => Status::Failed,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Successful => None,
            Self::Aborted(failure) | Self::Failed(failure) => Some(failure),
        }
    }
}

/// Receives descriptor-level events from an engine, in traversal order.
pub trait EngineExecutionListener {
    fn dynamic_test_registered(&mut self, _descriptor: &TestDescriptor) {}

    fn execution_started(&mut self, _descriptor: &TestDescriptor) {}

    fn execution_skipped(&mut self, _descriptor: &TestDescriptor, _reason: &str) {}

    fn execution_finished(&mut self, _descriptor: &TestDescriptor, _result: &TestExecutionResult) {}
}

/// Receives plan-level events from the launcher.
pub trait TestExecutionListener {
    fn test_plan_execution_started(&mut self, _plan: &TestPlan) {}

    fn test_plan_execution_finished(&mut self, _plan: &TestPlan) {}

    fn dynamic_test_registered(&mut self, _identifier: &TestIdentifier) {}

    fn execution_started(&mut self, _identifier: &TestIdentifier) {}

    fn execution_skipped(&mut self, _identifier: &TestIdentifier, _reason: &str) {}

    fn execution_finished(&mut self, _identifier: &TestIdentifier, _result: &TestExecutionResult) {}
}

/// Forwards every event to each listener in order.
pub(crate) struct CompositeListener<'a, 'b> {
    pub listeners: &'a mut [&'b mut dyn TestExecutionListener],
}

impl TestExecutionListener for CompositeListener<'_, '_> {
    fn test_plan_execution_started(&mut self, plan: &TestPlan) {
        for listener in self.listeners.iter_mut() {
            listener.test_plan_execution_started(plan);
        }
    }

    fn test_plan_execution_finished(&mut self, plan: &TestPlan) {
        for listener in self.listeners.iter_mut() {
            listener.test_plan_execution_finished(plan);
        }
    }

    fn dynamic_test_registered(&mut self, identifier: &TestIdentifier) {
        for listener in self.listeners.iter_mut() {
            listener.dynamic_test_registered(identifier);
        }
    }

    fn execution_started(&mut self, identifier: &TestIdentifier) {
        for listener in self.listeners.iter_mut() {
            listener.execution_started(identifier);
        }
    }

    fn execution_skipped(&mut self, identifier: &TestIdentifier, reason: &str) {
        for listener in self.listeners.iter_mut() {
            listener.execution_skipped(identifier, reason);
        }
    }

    fn execution_finished(&mut self, identifier: &TestIdentifier, result: &TestExecutionResult) {
        for listener in self.listeners.iter_mut() {
            listener.execution_finished(identifier, result);
        }
    }
}

/// Turns descriptor events into identifier events.
///
/// Dynamic tests are added to the plan before the registration event is forwarded, so listeners can always
/// look up the parent of an identifier they receive.
pub struct ExecutionListenerAdapter<'a> {
    plan: &'a mut TestPlan,
    delegate: &'a mut dyn TestExecutionListener,
}

impl<'a> ExecutionListenerAdapter<'a> {
    pub fn new(plan: &'a mut TestPlan, delegate: &'a mut dyn TestExecutionListener) -> Self {
        Self { plan, delegate }
    }

    fn identifier(&self, descriptor: &TestDescriptor) -> TestIdentifier {
        self.plan
            .identifier(descriptor.unique_id())
            .cloned()
            .unwrap_or_else(|| TestIdentifier::from_descriptor(descriptor))
    }
}

impl EngineExecutionListener for ExecutionListenerAdapter<'_> {
    fn dynamic_test_registered(&mut self, descriptor: &TestDescriptor) {
        let identifier = TestIdentifier::from_descriptor(descriptor);
        self.plan.add(identifier.clone());
        self.delegate.dynamic_test_registered(&identifier);
    }

    fn execution_started(&mut self, descriptor: &TestDescriptor) {
        let identifier = self.identifier(descriptor);
        self.delegate.execution_started(&identifier);
    }

    fn execution_skipped(&mut self, descriptor: &TestDescriptor, reason: &str) {
        let identifier = self.identifier(descriptor);
        self.delegate.execution_skipped(&identifier, reason);
    }

    fn execution_finished(&mut self, descriptor: &TestDescriptor, result: &TestExecutionResult) {
        let identifier = self.identifier(descriptor);
        self.delegate.execution_finished(&identifier, result);
    }
}
