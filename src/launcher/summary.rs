//! Counting listener.

use std::time::{Duration, Instant};

use trellis_core::Failure;

use super::{Status, TestExecutionListener, TestExecutionResult, TestIdentifier, TestPlan};

/// Counts for one run. Tests and containers are counted separately; a factory counts as both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestExecutionSummary {
    pub tests_found: usize,
    pub tests_started: usize,
    pub tests_succeeded: usize,
    pub tests_failed: usize,
    pub tests_aborted: usize,
    pub tests_skipped: usize,
    pub containers_started: usize,
    pub containers_succeeded: usize,
    pub containers_failed: usize,
    pub containers_aborted: usize,
    pub containers_skipped: usize,
    pub dynamic_tests_registered: usize,
    pub failures: Vec<(TestIdentifier, Failure)>,
    pub duration: Duration,
}

impl TestExecutionSummary {
    pub fn total_failures(&self) -> usize {
        self.tests_failed + self.containers_failed
    }

    pub fn is_success(&self) -> bool {
        self.total_failures() == 0
    }
}

/// Builds a [`TestExecutionSummary`] from the events of one run.
#[derive(Debug, Default)]
pub struct SummaryGeneratingListener {
    summary: TestExecutionSummary,
    started_at: Option<Instant>,
}

impl SummaryGeneratingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> &TestExecutionSummary {
        &self.summary
    }
}

impl TestExecutionListener for SummaryGeneratingListener {
    fn test_plan_execution_started(&mut self, plan: &TestPlan) {
        self.summary = TestExecutionSummary {
            tests_found: plan.count_tests(),
            ..TestExecutionSummary::default()
        };
        self.started_at = Some(Instant::now());
    }

    fn test_plan_execution_finished(&mut self, _plan: &TestPlan) {
        if let Some(started_at) = self.started_at {
            self.summary.duration = started_at.elapsed();
        }
    }

    fn dynamic_test_registered(&mut self, identifier: &TestIdentifier) {
        self.summary.dynamic_tests_registered += 1;
        if identifier.is_test() {
            self.summary.tests_found += 1;
        }
    }

    fn execution_started(&mut self, identifier: &TestIdentifier) {
        if identifier.is_test() {
            self.summary.tests_started += 1;
        }
        if identifier.is_container() {
            self.summary.containers_started += 1;
        }
    }

    fn execution_skipped(&mut self, identifier: &TestIdentifier, _reason: &str) {
        if identifier.is_test() {
            self.summary.tests_skipped += 1;
        }
        if identifier.is_container() {
            self.summary.containers_skipped += 1;
        }
    }

    fn execution_finished(&mut self, identifier: &TestIdentifier, result: &TestExecutionResult) {
        let summary = &mut self.summary;
        let (tests, containers) = match result.status() {
            Status::Successful => (&mut summary.tests_succeeded, &mut summary.containers_succeeded),
            Status::Aborted => (&mut summary.tests_aborted, &mut summary.containers_aborted),
            Status::Failed => (&mut summary.tests_failed, &mut summary.containers_failed),
        };
        if identifier.is_test() {
            *tests += 1;
        }
        if identifier.is_container() {
            *containers += 1;
        }
        if let TestExecutionResult::Failed(failure) = result {
            summary.failures.push((identifier.clone(), failure.clone()));
        }
    }
}
