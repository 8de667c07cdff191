#![forbid(unsafe_code)]
//! Trellis: hierarchical test discovery and execution with a pluggable extension model
//!
//! A harness describes test classes as plain data ([`model`]), a [`resolver`] turns a
//! [`TestPlanSpecification`](resolver::TestPlanSpecification) into a descriptor tree ([`descriptor`]),
//! and the [`engine`] walks that tree, running extension callbacks ([`extension`]) around every
//! container and test. The [`launcher`] drives one or more engines and reports plan-level events to
//! listeners; [`cli`] wraps all of it in a command-line harness.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **User code**: panics inside test bodies and extension callbacks are caught at the invocation boundary
//!   and reported as failures. Nothing raised by a test unwinds past the engine.

pub mod cli;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod extension;
pub mod launcher;
pub mod model;
pub mod resolver;

pub use trellis_core::{Fallible, Failure, FailureKind, ThrowableCollector, UniqueId, assertions};

pub use config::{Details, RunConfig};
pub use engine::{ENGINE_ID, TrellisEngine};
pub use launcher::{Launcher, TestPlan};
pub use resolver::{Selector, TestPlanSpecification};
