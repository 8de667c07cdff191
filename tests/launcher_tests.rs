//! Integration tests for the launcher: engine management, plan building and listener fan-out.

mod common;

use std::rc::Rc;

use common::CallLog;
use trellis::descriptor::{DescriptorType, TestDescriptor};
use trellis::launcher::{
    DiscoveredTests, EngineExecutionListener, EventRecorder, LauncherError, SummaryGeneratingListener, TestEngine,
    TestExecutionListener, TestExecutionResult, TestIdentifier, TestPlan,
};
use trellis::model::{Catalog, TestClass, TestMethod};
use trellis::{Failure, Launcher, RunConfig, Selector, TestPlanSpecification, TrellisEngine, UniqueId};

// ============================================================================
// Fixtures
// ============================================================================

/// An engine with a flat list of tests; tests named `fail*` fail.
struct StubEngine {
    id: &'static str,
    tests: Vec<&'static str>,
}

impl TestEngine for StubEngine {
    fn id(&self) -> &str {
        self.id
    }

    fn discover(&self, _specification: &TestPlanSpecification) -> Box<dyn DiscoveredTests> {
        let root = TestDescriptor::engine(self.id);
        let tests = self
            .tests
            .iter()
            .map(|name| TestDescriptor::new(root.unique_id().append(*name), *name, DescriptorType::Test))
            .collect();
        Box::new(StubTree { root, tests })
    }
}

struct StubTree {
    root: TestDescriptor,
    tests: Vec<TestDescriptor>,
}

impl DiscoveredTests for StubTree {
    fn root(&self) -> &TestDescriptor {
        &self.root
    }

    fn descriptors(&self) -> Vec<&TestDescriptor> {
        std::iter::once(&self.root).chain(&self.tests).collect()
    }

    fn execute(self: Box<Self>, listener: &mut dyn EngineExecutionListener) {
        listener.execution_started(&self.root);
        for test in &self.tests {
            listener.execution_started(test);
            let result = if test.display_name().starts_with("fail") {
                TestExecutionResult::Failed(Failure::assertion("stubbed failure"))
            } else {
                TestExecutionResult::Successful
            };
            listener.execution_finished(test, &result);
        }
        listener.execution_finished(&self.root, &TestExecutionResult::Successful);
    }
}

fn stub(id: &'static str, tests: &[&'static str]) -> Box<StubEngine> {
    Box::new(StubEngine {
        id,
        tests: tests.to_vec(),
    })
}

fn trellis_engine() -> Box<TrellisEngine> {
    let catalog = Catalog::new().with(
        TestClass::builder("demo.Calc")
            .instance(|| ())
            .test("adds", |_: &()| Ok(()))
            .method(TestMethod::on::<()>("slow_sum", |_, _| Ok(())).tag("slow").marker(trellis::model::Marker::Test))
            .build(),
    );
    Box::new(TrellisEngine::new(Rc::new(catalog)))
}

fn everything() -> TestPlanSpecification {
    TestPlanSpecification::builder().select(Selector::package("")).build()
}

/// Logs `"{tag}:{event}"` for plan and execution events.
struct Tagged {
    tag: &'static str,
    log: CallLog,
}

impl TestExecutionListener for Tagged {
    fn test_plan_execution_started(&mut self, _plan: &TestPlan) {
        self.log.push(format!("{}:plan_started", self.tag));
    }

    fn test_plan_execution_finished(&mut self, _plan: &TestPlan) {
        self.log.push(format!("{}:plan_finished", self.tag));
    }

    fn execution_started(&mut self, identifier: &TestIdentifier) {
        self.log.push(format!("{}:started({})", self.tag, identifier.display_name()));
    }
}

// ============================================================================
// Engine management
// ============================================================================

#[test]
fn test_launcher_without_engines_is_an_error() {
    let err = Launcher::new().discover(&everything()).unwrap_err();
    assert!(matches!(err, LauncherError::NoEngines));
}

#[test]
fn test_duplicate_engine_is_rejected() {
    let mut launcher = Launcher::new();
    launcher.register_engine(trellis_engine()).unwrap();
    let err = launcher.register_engine(trellis_engine()).err().unwrap();
    assert!(matches!(&err, LauncherError::DuplicateEngine { id } if id == "trellis"));
    assert_eq!(err.to_string(), "a test engine with id 'trellis' is already registered");
}

#[test]
fn test_unknown_engine_lists_available_engines() {
    let mut launcher = Launcher::new();
    launcher.register_engine(trellis_engine()).unwrap();
    launcher.register_engine(stub("stub", &["one"])).unwrap();
    let specification = TestPlanSpecification::builder()
        .select(Selector::package(""))
        .engine("junit")
        .build();

    let err = launcher
        .execute(&specification, &mut [&mut EventRecorder::new()])
        .unwrap_err();

    match err {
        LauncherError::UnknownEngine { id, available } => {
            assert_eq!(id, "junit");
            assert_eq!(available, "trellis, stub");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_engine_filter_limits_execution() {
    let mut launcher = Launcher::new();
    launcher.register_engine(trellis_engine()).unwrap();
    launcher.register_engine(stub("stub", &["one", "two"])).unwrap();
    let specification = TestPlanSpecification::builder()
        .select(Selector::package(""))
        .engine("stub")
        .build();

    let mut recorder = EventRecorder::new();
    let plan = launcher.execute(&specification, &mut [&mut recorder]).unwrap();

    let roots: Vec<&str> = plan.roots().iter().map(|root| root.display_name()).collect();
    assert_eq!(roots, vec!["Engine: stub"]);
    assert_eq!(
        recorder.lines(),
        vec![
            "plan_started",
            "started(Engine: stub)",
            "started(one)",
            "succeeded(one)",
            "started(two)",
            "succeeded(two)",
            "succeeded(Engine: stub)",
            "plan_finished",
        ]
    );
}

#[test]
fn test_engines_without_tests_are_dropped() {
    let mut launcher = Launcher::new();
    launcher.register_engine(stub("empty", &[])).unwrap();
    launcher.register_engine(stub("stub", &["one"])).unwrap();

    let plan = launcher.discover(&everything()).unwrap();

    let roots: Vec<&str> = plan.roots().iter().map(|root| root.display_name()).collect();
    assert_eq!(roots, vec!["Engine: stub"]);
    assert!(plan.identifier(&UniqueId::for_engine("empty")).is_none());
}

// ============================================================================
// Plan and listeners
// ============================================================================

#[test]
fn test_discovered_plan_spans_engines() {
    let mut launcher = Launcher::new();
    launcher.register_engine(trellis_engine()).unwrap();
    launcher.register_engine(stub("stub", &["one"])).unwrap();

    let plan = launcher.discover(&everything()).unwrap();

    assert_eq!(plan.count_tests(), 3);
    let class = UniqueId::parse("trellis:demo.Calc").unwrap();
    let children: Vec<&str> = plan.children(&class).iter().map(|child| child.display_name()).collect();
    assert_eq!(children, vec!["adds()", "slow_sum()"]);
    let slow = plan.identifier(&class.append("slow_sum()")).unwrap();
    assert_eq!(slow.tags(), &["slow".to_string()]);
    assert_eq!(slow.parent_id(), Some(&class));
    assert_eq!(plan.descendants(&UniqueId::for_engine("trellis")).len(), 4);
}

#[test]
fn test_run_config_filters_apply_to_discovery() {
    let mut launcher = Launcher::new();
    launcher.register_engine(trellis_engine()).unwrap();
    let config = RunConfig::new().exclude_tag("slow");
    let specification = config
        .apply(TestPlanSpecification::builder().select(Selector::class("demo.Calc")))
        .build();

    let plan = launcher.discover(&specification).unwrap();

    assert_eq!(plan.count_tests(), 1);
    assert!(plan.identifier(&UniqueId::parse("trellis:demo.Calc/adds()").unwrap()).is_some());
}

#[test]
fn test_registered_listeners_are_notified_first() {
    let log = CallLog::new();
    let mut launcher = Launcher::new();
    launcher.register_engine(stub("stub", &["one"])).unwrap();
    launcher.register_listener(Box::new(Tagged {
        tag: "registered",
        log: log.clone(),
    }));
    let mut first = Tagged {
        tag: "first",
        log: log.clone(),
    };
    let mut second = Tagged {
        tag: "second",
        log: log.clone(),
    };

    launcher.execute(&everything(), &mut [&mut first, &mut second]).unwrap();

    assert_eq!(
        log.entries()[..6],
        [
            "registered:plan_started",
            "first:plan_started",
            "second:plan_started",
            "registered:started(Engine: stub)",
            "first:started(Engine: stub)",
            "second:started(Engine: stub)",
        ]
    );
    assert_eq!(log.entries().last().map(String::as_str), Some("second:plan_finished"));
}

#[test]
fn test_summary_counts_all_engines() {
    let mut launcher = Launcher::new();
    launcher.register_engine(trellis_engine()).unwrap();
    launcher.register_engine(stub("stub", &["one", "fails"])).unwrap();
    let mut summary = SummaryGeneratingListener::new();

    launcher.execute(&everything(), &mut [&mut summary]).unwrap();

    let summary = summary.summary();
    assert_eq!(summary.tests_found, 4);
    assert_eq!(summary.tests_started, 4);
    assert_eq!(summary.tests_succeeded, 3);
    assert_eq!(summary.tests_failed, 1);
    // two engine roots and one class
    assert_eq!(summary.containers_succeeded, 3);
    assert_eq!(summary.total_failures(), 1);
    assert!(!summary.is_success());
    let (failed, failure) = &summary.failures[0];
    assert_eq!(failed.display_name(), "fails");
    assert_eq!(failure.message(), "stubbed failure");
}
