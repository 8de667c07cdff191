//! Assertions and assumptions for test bodies and callbacks.
//!
//! Assertions produce [`FailureKind::Assertion`](crate::FailureKind::Assertion) failures; assumptions produce
//! aborted failures, which the engine reports as *aborted* rather than *failed*.

use std::fmt::Debug;

use crate::failure::{Fallible, Failure};

/// Fail unconditionally.
pub fn fail<T>(message: impl Into<String>) -> Fallible<T> {
    Err(Failure::assertion(message))
}

pub fn assert_true(condition: bool, message: impl Into<String>) -> Fallible {
    if condition { Ok(()) } else { fail(message) }
}

pub fn assert_false(condition: bool, message: impl Into<String>) -> Fallible {
    assert_true(!condition, message)
}

pub fn assert_equals<T: PartialEq + Debug>(expected: T, actual: T) -> Fallible {
    if expected == actual {
        Ok(())
    } else {
        fail(format!("expected: <{expected:?}> but was: <{actual:?}>"))
    }
}

/// Abort the current test unless `condition` holds.
pub fn assume_true(condition: bool, reason: impl Into<String>) -> Fallible {
    if condition { Ok(()) } else { Err(Failure::aborted(reason)) }
}

pub fn assume_false(condition: bool, reason: impl Into<String>) -> Fallible {
    assume_true(!condition, reason)
}
