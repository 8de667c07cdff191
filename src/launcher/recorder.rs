//! Listener recording every event in order.

use trellis_core::UniqueId;

use super::{Status, TestExecutionListener, TestExecutionResult, TestIdentifier, TestPlan};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PlanStarted,
    DynamicTestRegistered { id: UniqueId, name: String },
    Started { id: UniqueId, name: String },
    Skipped { id: UniqueId, name: String, reason: String },
    Finished { id: UniqueId, name: String, result: TestExecutionResult },
    PlanFinished,
}

impl Event {
    pub fn unique_id(&self) -> Option<&UniqueId> {
        match self {
            Event::PlanStarted | Event::PlanFinished => None,
            Event::DynamicTestRegistered { id, .. }
            | Event::Started { id, .. }
            | Event::Skipped { id, .. }
            | Event::Finished { id, .. } => Some(id),
        }
    }

    /// One-line form: `started(name)`, `failed(name)`, `skipped(name)`, ...
    pub fn line(&self) -> String {
        match self {
            Event::PlanStarted => "plan_started".to_string(),
            Event::PlanFinished => "plan_finished".to_string(),
            Event::DynamicTestRegistered { name, .. } => format!("registered({name})"),
            Event::Started { name, .. } => format!("started({name})"),
            Event::Skipped { name, .. } => format!("skipped({name})"),
            Event::Finished { name, result, .. } => match result.status() {
                Status::Successful => format!("succeeded({name})"),
                Status::Aborted => format!("aborted({name})"),
                Status::Failed => format!("failed({name})"),
            },
        }
    }
}

/// Keeps the ordered event log of a run.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Vec<Event>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(Event::line).collect()
    }

    /// The finished result of the node named `name`.
    pub fn result_of(&self, name: &str) -> Option<&TestExecutionResult> {
        self.events.iter().find_map(|event| match event {
            Event::Finished { name: n, result, .. } if n == name => Some(result),
            _ => None,
        })
    }
}

impl TestExecutionListener for EventRecorder {
    fn test_plan_execution_started(&mut self, _plan: &TestPlan) {
        self.events.push(Event::PlanStarted);
    }

    fn test_plan_execution_finished(&mut self, _plan: &TestPlan) {
        self.events.push(Event::PlanFinished);
    }

    fn dynamic_test_registered(&mut self, identifier: &TestIdentifier) {
        self.events.push(Event::DynamicTestRegistered {
            id: identifier.unique_id().clone(),
            name: identifier.display_name().to_string(),
        });
    }

    fn execution_started(&mut self, identifier: &TestIdentifier) {
        self.events.push(Event::Started {
            id: identifier.unique_id().clone(),
            name: identifier.display_name().to_string(),
        });
    }

    fn execution_skipped(&mut self, identifier: &TestIdentifier, reason: &str) {
        self.events.push(Event::Skipped {
            id: identifier.unique_id().clone(),
            name: identifier.display_name().to_string(),
            reason: reason.to_string(),
        });
    }

    fn execution_finished(&mut self, identifier: &TestIdentifier, result: &TestExecutionResult) {
        self.events.push(Event::Finished {
            id: identifier.unique_id().clone(),
            name: identifier.display_name().to_string(),
            result: result.clone(),
        });
    }
}
