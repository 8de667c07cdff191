//! Console reporting (pytest-style).
//!
//! [`ConsoleReporter`] is a [`TestExecutionListener`]: it prints as events arrive and keeps just enough
//! state to print a failure section and a summary line when the plan finishes. Output goes to any
//! [`Write`], stderr by default.
//!
//! Layouts:
//! - flat: one `.`/`F`/`A`/`s` per test, or `path ... STATUS` per test when verbose
//! - tree: containers on their own lines, tests indented under them with their status

use std::fmt;
use std::io::{self, Write};
use std::time::Instant;

use trellis_core::Failure;

use crate::config::{Details, RunConfig};
use crate::launcher::{Status, TestExecutionListener, TestExecutionResult, TestIdentifier, TestPlan};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Default)]
struct Tally {
    passed: usize,
    failed: usize,
    aborted: usize,
    skipped: usize,
    /// Containers that failed on their own (before-all, after-all, configuration).
    errors: usize,
}

/// Prints progress and a summary for one run.
pub struct ConsoleReporter<W: Write> {
    out: W,
    verbose: bool,
    color: bool,
    durations: bool,
    details: Details,
    /// Display names of the nodes currently executing, outermost first (engine roots excluded).
    path: Vec<String>,
    failures: Vec<(String, Failure)>,
    tally: Tally,
    started_at: Option<Instant>,
}

impl ConsoleReporter<io::Stderr> {
    pub fn stderr(config: &RunConfig) -> Self {
        Self::new(io::stderr(), config)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, config: &RunConfig) -> Self {
        Self {
            out,
            verbose: config.verbose,
            color: config.color,
            durations: config.durations,
            details: config.details,
            path: Vec::new(),
            failures: Vec::new(),
            tally: Tally::default(),
            started_at: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        // Reporting never fails a run.
        let _ = self.out.write_fmt(args);
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn indent(&self) -> String {
        "  ".repeat(self.path.len())
    }

    fn qualified(&self, name: &str) -> String {
        let mut parts: Vec<&str> = self.path.iter().map(String::as_str).collect();
        parts.push(name);
        parts.join(" > ")
    }

    fn status_word(&self, result: &TestExecutionResult) -> String {
        match result.status() {
            Status::Successful => self.paint(GREEN, "PASSED"),
            Status::Aborted => self.paint(YELLOW, "ABORTED"),
            Status::Failed => self.paint(RED, "FAILED"),
        }
    }

    fn progress_char(&self, result: &TestExecutionResult) -> String {
        match result.status() {
            Status::Successful => self.paint(GREEN, "."),
            Status::Aborted => self.paint(YELLOW, "A"),
            Status::Failed => self.paint(RED, "F"),
        }
    }

    fn report_test(&mut self, identifier: &TestIdentifier, result: &TestExecutionResult) {
        match result.status() {
            Status::Successful => self.tally.passed += 1,
            Status::Aborted => self.tally.aborted += 1,
            Status::Failed => self.tally.failed += 1,
        }
        let line = match (self.details, self.verbose) {
            (Details::Tree, _) => format!("{}{} {}\n", self.indent(), identifier.display_name(), self.status_word(result)),
            (Details::Flat, true) => format!("{} ... {}\n", self.qualified(identifier.display_name()), self.status_word(result)),
            (Details::Flat, false) => self.progress_char(result),
        };
        self.emit(format_args!("{line}"));
    }

    fn write_failures(&mut self) {
        if self.failures.is_empty() {
            return;
        }
        let header = self.paint(RED, "=================== FAILURES ===================");
        self.emit(format_args!("\n{header}\n"));
        let failures = std::mem::take(&mut self.failures);
        for (name, failure) in &failures {
            let title = self.paint(RED, &format!("___ {name} ___"));
            self.emit(format_args!("{title}\n{failure}\n"));
            let mut cause = failure.cause();
            while let Some(inner) = cause {
                self.emit(format_args!("  caused by: {inner}\n"));
                cause = inner.cause();
            }
            for suppressed in failure.suppressed() {
                self.emit(format_args!("  suppressed: {suppressed}\n"));
            }
        }
        self.failures = failures;
    }

    fn summary_line(&self) -> String {
        let mut parts = Vec::new();
        if self.tally.passed > 0 {
            parts.push(self.paint(GREEN, &format!("{} passed", self.tally.passed)));
        }
        if self.tally.failed > 0 {
            parts.push(self.paint(RED, &format!("{} failed", self.tally.failed)));
        }
        if self.tally.errors > 0 {
            parts.push(self.paint(RED, &format!("{} error(s)", self.tally.errors)));
        }
        if self.tally.aborted > 0 {
            parts.push(self.paint(YELLOW, &format!("{} aborted", self.tally.aborted)));
        }
        if self.tally.skipped > 0 {
            parts.push(self.paint(YELLOW, &format!("{} skipped", self.tally.skipped)));
        }
        if parts.is_empty() {
            parts.push("no tests ran".to_string());
        }
        match self.started_at {
            Some(started_at) if self.durations => format!(
                "====== {} in {:.2}s ======",
                parts.join(", "),
                started_at.elapsed().as_secs_f64()
            ),
            _ => format!("====== {} ======", parts.join(", ")),
        }
    }
}

/// Engine roots have no parent and are not printed.
fn is_engine_root(identifier: &TestIdentifier) -> bool {
    identifier.parent_id().is_none()
}

impl<W: Write> TestExecutionListener for ConsoleReporter<W> {
    fn test_plan_execution_started(&mut self, plan: &TestPlan) {
        self.started_at = Some(Instant::now());
        self.tally = Tally::default();
        self.failures.clear();
        let banner = self.paint(BOLD, "=================== test session starts ===================");
        self.emit(format_args!("{banner}\ncollected {} item(s)\n\n", plan.count_tests()));
    }

    fn test_plan_execution_finished(&mut self, _plan: &TestPlan) {
        if self.details == Details::Flat && !self.verbose {
            self.emit(format_args!("\n"));
        }
        self.write_failures();
        let summary = self.summary_line();
        self.emit(format_args!("\n{summary}\n"));
        let _ = self.out.flush();
    }

    fn execution_started(&mut self, identifier: &TestIdentifier) {
        if is_engine_root(identifier) {
            return;
        }
        if identifier.is_container() {
            if self.details == Details::Tree {
                let line = format!("{}{}\n", self.indent(), identifier.display_name());
                self.emit(format_args!("{line}"));
            }
            self.path.push(identifier.display_name().to_string());
        }
    }

    fn execution_skipped(&mut self, identifier: &TestIdentifier, reason: &str) {
        if is_engine_root(identifier) {
            return;
        }
        self.tally.skipped += 1;
        let word = if reason.is_empty() {
            self.paint(YELLOW, "SKIPPED")
        } else {
            format!("{} ({reason})", self.paint(YELLOW, "SKIPPED"))
        };
        let line = match (self.details, self.verbose) {
            (Details::Tree, _) => format!("{}{} {word}\n", self.indent(), identifier.display_name()),
            (Details::Flat, true) => format!("{} ... {word}\n", self.qualified(identifier.display_name())),
            (Details::Flat, false) => self.paint(YELLOW, "s"),
        };
        self.emit(format_args!("{line}"));
    }

    fn execution_finished(&mut self, identifier: &TestIdentifier, result: &TestExecutionResult) {
        if identifier.is_container() && !is_engine_root(identifier) {
            self.path.pop();
        }
        if let TestExecutionResult::Failed(failure) = result {
            self.failures.push((self.qualified(identifier.display_name()), failure.clone()));
        }
        if identifier.is_test() {
            self.report_test(identifier, result);
        } else if result.status() == Status::Failed {
            self.tally.errors += 1;
            if self.details == Details::Tree || self.verbose {
                let line = format!(
                    "{}{} {}\n",
                    self.indent(),
                    identifier.display_name(),
                    self.paint(RED, "ERROR")
                );
                self.emit(format_args!("{line}"));
            } else {
                let mark = self.paint(RED, "E");
                self.emit(format_args!("{mark}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorType, TestDescriptor};

    fn identifier(descriptor: &TestDescriptor) -> TestIdentifier {
        TestIdentifier::from_descriptor(descriptor)
    }

    fn render(config: &RunConfig) -> String {
        let engine = TestDescriptor::engine("trellis");
        let class = TestDescriptor::new(engine.unique_id().append("a.Calc"), "Calc", DescriptorType::Container);
        let adds = TestDescriptor::new(class.unique_id().append("adds()"), "adds()", DescriptorType::Test);
        let fails = TestDescriptor::new(class.unique_id().append("fails()"), "fails()", DescriptorType::Test);
        let off = TestDescriptor::new(class.unique_id().append("off()"), "off()", DescriptorType::Test);
        let plan = TestPlan::from_descriptors([&engine, &class, &adds, &fails, &off]);

        let mut reporter = ConsoleReporter::new(Vec::new(), config);
        reporter.test_plan_execution_started(&plan);
        reporter.execution_started(&identifier(&engine));
        reporter.execution_started(&identifier(&class));
        reporter.execution_started(&identifier(&adds));
        reporter.execution_finished(&identifier(&adds), &TestExecutionResult::Successful);
        reporter.execution_started(&identifier(&fails));
        let mut failure = Failure::assertion("expected 3 but was 4");
        failure.add_suppressed(Failure::error("cleanup failed"));
        reporter.execution_finished(&identifier(&fails), &TestExecutionResult::Failed(failure));
        reporter.execution_skipped(&identifier(&off), "not today");
        reporter.execution_finished(&identifier(&class), &TestExecutionResult::Successful);
        reporter.execution_finished(&identifier(&engine), &TestExecutionResult::Successful);
        reporter.test_plan_execution_finished(&plan);
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    fn plain() -> RunConfig {
        RunConfig::new().with_color(false).with_durations(false)
    }

    #[test]
    fn test_flat_output() {
        insta::assert_snapshot!(render(&plain()), @r"
        =================== test session starts ===================
        collected 3 item(s)

        .Fs

        =================== FAILURES ===================
        ___ Calc > fails() ___
        assertion failed: expected 3 but was 4
          suppressed: error: cleanup failed

        ====== 1 passed, 1 failed, 1 skipped ======
        ");
    }

    #[test]
    fn test_verbose_output() {
        let output = render(&plain().with_verbose(true));
        assert!(output.contains("Calc > adds() ... PASSED\n"));
        assert!(output.contains("Calc > fails() ... FAILED\n"));
        assert!(output.contains("Calc > off() ... SKIPPED (not today)\n"));
    }

    #[test]
    fn test_tree_output() {
        let output = render(&plain().with_details(Details::Tree));
        assert!(output.contains("Calc\n  adds() PASSED\n  fails() FAILED\n  off() SKIPPED (not today)\n"));
    }

    #[test]
    fn test_color_codes_only_when_enabled() {
        assert!(!render(&plain()).contains('\x1b'));
        assert!(render(&RunConfig::new().with_durations(false)).contains(GREEN));
    }
}
