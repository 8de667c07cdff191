//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use trellis::Fallible;
use trellis::extension::{
    AfterAllCallback, AfterEachCallback, BeforeAllCallback, BeforeEachCallback, Extension, ExtensionContext,
    ExtensionDecl, Registrar,
};
use trellis::launcher::{Event, EventRecorder, Launcher, SummaryGeneratingListener, TestExecutionSummary, TestPlan};
use trellis::model::Catalog;
use trellis::{Selector, TestPlanSpecification, TrellisEngine};

/// An ordered call log shared between fixtures and assertions.
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Everything observable about one run.
pub struct Run {
    pub recorder: EventRecorder,
    pub summary: TestExecutionSummary,
    pub plan: TestPlan,
}

impl Run {
    /// Event lines without the engine root's started/finished pair.
    pub fn lines(&self) -> Vec<String> {
        self.recorder
            .events()
            .iter()
            .filter(|event| event.unique_id().is_some_and(|id| !id.is_engine_root()))
            .map(Event::line)
            .collect()
    }
}

pub fn execute(catalog: Catalog, specification: &TestPlanSpecification) -> Run {
    let mut launcher = Launcher::new();
    launcher
        .register_engine(Box::new(TrellisEngine::new(Rc::new(catalog))))
        .unwrap();
    let mut recorder = EventRecorder::new();
    let mut summary = SummaryGeneratingListener::new();
    let plan = launcher
        .execute(specification, &mut [&mut recorder, &mut summary])
        .unwrap();
    Run {
        recorder,
        summary: summary.summary().clone(),
        plan,
    }
}

pub fn execute_class(catalog: Catalog, class_name: &str) -> Run {
    let specification = TestPlanSpecification::builder()
        .select(Selector::class(class_name))
        .build();
    execute(catalog, &specification)
}

/// Logs `"{name}.before_all"`, `"{name}.before_each"`, ... for every callback it receives.
pub struct Recording {
    name: String,
    log: CallLog,
}

impl Recording {
    pub fn declare(name: &str, log: &CallLog) -> ExtensionDecl {
        let extension = Rc::new(Recording {
            name: name.to_string(),
            log: log.clone(),
        });
        ExtensionDecl::shared(name, extension)
    }

    fn record(&self, callback: &str) -> Fallible {
        self.log.push(format!("{}.{callback}", self.name));
        Ok(())
    }
}

impl BeforeAllCallback for Recording {
    fn before_all(&self, _context: &ExtensionContext) -> Fallible {
        self.record("before_all")
    }
}

impl AfterAllCallback for Recording {
    fn after_all(&self, _context: &ExtensionContext) -> Fallible {
        self.record("after_all")
    }
}

impl BeforeEachCallback for Recording {
    fn before_each(&self, _context: &ExtensionContext) -> Fallible {
        self.record("before_each")
    }
}

impl AfterEachCallback for Recording {
    fn after_each(&self, _context: &ExtensionContext) -> Fallible {
        self.record("after_each")
    }
}

impl Extension for Recording {
    fn register(self: Rc<Self>, registrar: &mut Registrar<'_>) {
        registrar
            .before_all(self.clone())
            .after_all(self.clone())
            .before_each(self.clone())
            .after_each(self);
    }
}
