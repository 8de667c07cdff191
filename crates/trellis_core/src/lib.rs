//! Provide the shared vocabulary of the trellis test engine.
//!
//! This crate is intentionally small and dependency-light. It holds the pieces that both the engine and
//! user-authored tests/extensions need to agree on:
//! - [`UniqueId`]: the stable, hierarchical identifier of every discovered node,
//! - [`Failure`]: the single error value produced by tests, callbacks and the engine itself,
//! - [`ThrowableCollector`]: runs independent actions and folds their failures into one primary failure,
//! - [`assertions`]: helpers that turn conditions into `Failure` values.
//!
//! ## Notes
//!
//! - No IO and no global state. Panics raised inside user code are only converted here (see [`catch`]),
//!   never raised.

pub mod assertions;
pub mod collector;
pub mod failure;
pub mod unique_id;

pub use collector::ThrowableCollector;
pub use failure::{Fallible, Failure, FailureKind, catch};
pub use unique_id::{UniqueId, UniqueIdError};
