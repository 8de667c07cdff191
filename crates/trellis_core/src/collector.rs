//! Throwable collector.
//!
//! Runs a sequence of independent actions without letting one failure abort the rest. The first failure
//! becomes the primary; every later failure is attached to it as suppressed. A collector seeded with an
//! earlier primary keeps that primary and suppresses everything collected afterwards onto it.

use crate::failure::{Fallible, Failure, catch};

#[derive(Debug, Default)]
pub struct ThrowableCollector {
    primary: Option<Failure>,
}

impl ThrowableCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing primary failure from an earlier phase.
    pub fn seeded(primary: Option<Failure>) -> Self {
        Self { primary }
    }

    /// Run `action` and record its failure, if any. Panics are recorded as failures too.
    pub fn execute(&mut self, action: impl FnOnce() -> Fallible) {
        if let Err(failure) = catch(action) {
            self.record(failure);
        }
    }

    /// Run `action` and return its value, recording the failure and returning `None` on error.
    pub fn execute_returning<T>(&mut self, action: impl FnOnce() -> Fallible<T>) -> Option<T> {
        match catch(action) {
            Ok(value) => Some(value),
            Err(failure) => {
                self.record(failure);
                None
            }
        }
    }

    pub fn record(&mut self, failure: Failure) {
        match &mut self.primary {
            Some(primary) => primary.add_suppressed(failure),
            None => self.primary = Some(failure),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none()
    }

    pub fn primary(&self) -> Option<&Failure> {
        self.primary.as_ref()
    }

    pub fn into_primary(self) -> Option<Failure> {
        self.primary
    }

    /// `Ok(())` when nothing was collected, otherwise the primary failure with the rest suppressed.
    pub fn assert_empty(self) -> Fallible {
        match self.primary {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}
