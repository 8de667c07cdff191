//! Command implementations

use std::io::Write;
use std::rc::Rc;

use tracing::info;

use super::{CliError, CliResult, ExitCode, Selection};
use crate::config::RunConfig;
use crate::engine::TrellisEngine;
use crate::launcher::{Launcher, SummaryGeneratingListener, TestExecutionListener, TestIdentifier, TestPlan};
use crate::model::Catalog;
use crate::resolver::{Selector, TestPlanSpecification};

/// Build the specification for a selection; no selectors at all selects every class.
pub fn specification(selection: &Selection, config: &RunConfig) -> CliResult<TestPlanSpecification> {
    let mut selectors = Vec::new();
    selectors.extend(selection.classes.iter().map(Selector::class));
    for text in &selection.methods {
        let selector = Selector::parse_method(text).ok_or_else(|| {
            CliError::failure(format!(
                "Error: invalid method selector '{text}'\nExpected Class#method or Class#method(T1, T2)"
            ))
        })?;
        selectors.push(selector);
    }
    selectors.extend(selection.packages.iter().map(Selector::package));
    for text in &selection.unique_ids {
        let selector = Selector::unique_id(text)
            .map_err(|e| CliError::failure(format!("Error: invalid unique id '{text}': {e}")))?;
        selectors.push(selector);
    }
    selectors.extend(selection.roots.iter().cloned().map(Selector::classpath_root));
    if selectors.is_empty() {
        selectors.push(Selector::package(""));
    }
    let builder = TestPlanSpecification::builder().select_all(selectors);
    Ok(config.apply(builder).build())
}

fn launcher(catalog: Rc<Catalog>) -> CliResult<Launcher> {
    let mut launcher = Launcher::new();
    launcher
        .register_engine(Box::new(TrellisEngine::new(catalog)))
        .map_err(CliError::diagnostic)?;
    Ok(launcher)
}

/// Print the discovered plan as an indented tree.
pub fn discover(catalog: Rc<Catalog>, specification: &TestPlanSpecification, out: &mut dyn Write) -> CliResult<ExitCode> {
    let plan = launcher(catalog)?
        .discover(specification)
        .map_err(CliError::diagnostic)?;
    write!(out, "{}", render_plan(&plan))
        .map_err(|e| CliError::failure(format!("Error writing test plan: {e}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Run the plan, reporting through `reporter`. Fails when any test or container failed.
pub fn execute(
    catalog: Rc<Catalog>,
    specification: &TestPlanSpecification,
    reporter: &mut dyn TestExecutionListener,
) -> CliResult<ExitCode> {
    let mut summary = SummaryGeneratingListener::new();
    launcher(catalog)?
        .execute(specification, &mut [reporter, &mut summary])
        .map_err(CliError::diagnostic)?;
    let summary = summary.summary();
    info!(
        found = summary.tests_found,
        failed = summary.total_failures(),
        "execution finished"
    );
    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// One line per node, two spaces per level, tests marked with their unique id.
pub fn render_plan(plan: &TestPlan) -> String {
    let mut out = String::new();
    if !plan.contains_tests() {
        out.push_str("No tests collected\n");
        return out;
    }
    for root in plan.roots() {
        render_node(plan, root, 0, &mut out);
    }
    out.push_str(&format!("\n{} test(s) found\n", plan.count_tests()));
    out
}

fn render_node(plan: &TestPlan, identifier: &TestIdentifier, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    if identifier.is_test() {
        out.push_str(&format!("{indent}{} [{}]\n", identifier.display_name(), identifier.unique_id()));
    } else {
        out.push_str(&format!("{indent}{}\n", identifier.display_name()));
    }
    for child in plan.children(identifier.unique_id()) {
        render_node(plan, child, depth + 1, out);
    }
}
