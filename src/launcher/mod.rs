//! Launcher: runs discovery and execution across registered engines and reports plan-level events.
//!
//! ## Flow
//!
//! 1. every engine accepted by the specification discovers its tree
//! 2. engines whose tree holds no tests are dropped
//! 3. the remaining trees become one [`TestPlan`]
//! 4. `planStarted`, each engine's execution (through an [`ExecutionListenerAdapter`]), `planFinished`
//!
//! Listeners registered on the launcher are notified first, then listeners passed to a single `execute`
//! call, each in registration order.

mod listener;
mod plan;
mod recorder;
mod summary;

pub use listener::{
    EngineExecutionListener, ExecutionListenerAdapter, Status, TestExecutionListener, TestExecutionResult,
};
pub use plan::{TestIdentifier, TestPlan};
pub use recorder::{Event, EventRecorder};
pub use summary::{SummaryGeneratingListener, TestExecutionSummary};

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info};

use crate::descriptor::TestDescriptor;
use crate::resolver::TestPlanSpecification;
use listener::CompositeListener;

/// A test engine: discovers a descriptor tree for a specification and executes it.
pub trait TestEngine {
    /// Engine id; the engine part of every unique id it produces.
    fn id(&self) -> &str;

    fn discover(&self, specification: &TestPlanSpecification) -> Box<dyn DiscoveredTests>;
}

/// The result of one engine's discovery.
pub trait DiscoveredTests {
    fn root(&self) -> &TestDescriptor;

    /// Every descriptor, parent before child.
    fn descriptors(&self) -> Vec<&TestDescriptor>;

    fn execute(self: Box<Self>, listener: &mut dyn EngineExecutionListener);

    fn contains_tests(&self) -> bool {
        self.descriptors().iter().any(|descriptor| descriptor.is_test())
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum LauncherError {
    #[error("no test engines are registered")]
    #[diagnostic(
        code(trellis::launcher::no_engines),
        help("register at least one engine with `Launcher::register_engine`")
    )]
    NoEngines,

    #[error("unknown test engine '{id}'")]
    #[diagnostic(code(trellis::launcher::unknown_engine), help("registered engines: {available}"))]
    UnknownEngine { id: String, available: String },

    #[error("a test engine with id '{id}' is already registered")]
    #[diagnostic(code(trellis::launcher::duplicate_engine))]
    DuplicateEngine { id: String },
}

/// Entry point for discovering and running tests across engines.
#[derive(Default)]
pub struct Launcher {
    engines: Vec<Box<dyn TestEngine>>,
    listeners: Vec<Box<dyn TestExecutionListener>>,
}

impl Launcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_engine(&mut self, engine: Box<dyn TestEngine>) -> Result<&mut Self, LauncherError> {
        if self.engines.iter().any(|e| e.id() == engine.id()) {
            return Err(LauncherError::DuplicateEngine {
                id: engine.id().to_string(),
            });
        }
        debug!(engine = engine.id(), "registered engine");
        self.engines.push(engine);
        Ok(self)
    }

    pub fn register_listener(&mut self, listener: Box<dyn TestExecutionListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    /// Discover without executing.
    #[tracing::instrument(skip_all, fields(engines = self.engines.len()))]
    pub fn discover(&self, specification: &TestPlanSpecification) -> Result<TestPlan, LauncherError> {
        let discovered = self.discover_engines(specification)?;
        Ok(plan_of(&discovered))
    }

    /// Discover and execute, notifying registered listeners and then `listeners`.
    ///
    /// Returns the plan including any dynamic tests registered during execution.
    #[tracing::instrument(skip_all, fields(engines = self.engines.len()))]
    pub fn execute(
        &mut self,
        specification: &TestPlanSpecification,
        listeners: &mut [&mut dyn TestExecutionListener],
    ) -> Result<TestPlan, LauncherError> {
        let discovered = self.discover_engines(specification)?;
        let mut plan = plan_of(&discovered);
        info!(tests = plan.count_tests(), "executing test plan");

        let mut all: Vec<&mut dyn TestExecutionListener> = Vec::new();
        for listener in self.listeners.iter_mut() {
            all.push(listener.as_mut());
        }
        for listener in listeners.iter_mut() {
            all.push(&mut **listener);
        }
        let mut composite = CompositeListener { listeners: &mut all };

        composite.test_plan_execution_started(&plan);
        for engine in discovered {
            let mut adapter = ExecutionListenerAdapter::new(&mut plan, &mut composite);
            engine.execute(&mut adapter);
        }
        composite.test_plan_execution_finished(&plan);
        Ok(plan)
    }

    fn discover_engines(
        &self,
        specification: &TestPlanSpecification,
    ) -> Result<Vec<Box<dyn DiscoveredTests>>, LauncherError> {
        if self.engines.is_empty() {
            return Err(LauncherError::NoEngines);
        }
        if let Some(unknown) = specification
            .engine_ids()
            .iter()
            .find(|id| !self.engines.iter().any(|e| e.id() == id.as_str()))
        {
            let available: Vec<&str> = self.engines.iter().map(|e| e.id()).collect();
            return Err(LauncherError::UnknownEngine {
                id: unknown.clone(),
                available: available.join(", "),
            });
        }

        let mut discovered = Vec::new();
        for engine in self.engines.iter().filter(|e| specification.accepts_engine(e.id())) {
            let tests = engine.discover(specification);
            if !tests.contains_tests() {
                debug!(engine = engine.id(), "engine discovered no tests");
                continue;
            }
            discovered.push(tests);
        }
        Ok(discovered)
    }
}

fn plan_of(discovered: &[Box<dyn DiscoveredTests>]) -> TestPlan {
    let mut plan = TestPlan::default();
    for engine in discovered {
        plan.merge(TestPlan::from_descriptors(engine.descriptors()));
    }
    plan
}
