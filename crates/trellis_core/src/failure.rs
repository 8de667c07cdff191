//! The failure value shared by tests, extension callbacks and the engine.
//!
//! A [`Failure`] plays the role a thrown exception plays in reflective test frameworks: it carries a
//! classification ([`FailureKind`]), a message, an optional cause and an ordered list of suppressed
//! failures. Teardown code attaches later failures to an earlier primary one instead of dropping them.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Result type for anything that can fail with a [`Failure`].
pub type Fallible<T = ()> = Result<T, Failure>;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// An assertion in a test or callback did not hold.
    Assertion,
    /// An explicit early exit (failed assumption). Reported as aborted, never as failed.
    Aborted,
    /// An extension or lifecycle method was registered incorrectly.
    Configuration,
    /// Parameter resolution found zero or several resolvers, or the resolver failed.
    ParameterResolution,
    /// A wrapper produced by dynamic invocation. Unwrapped once before classification.
    Invocation,
    /// User code panicked.
    Panic,
    /// Any other error raised by user code.
    Error,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Assertion => write!(f, "assertion failed"),
            FailureKind::Aborted => write!(f, "aborted"),
            FailureKind::Configuration => write!(f, "configuration error"),
            FailureKind::ParameterResolution => write!(f, "parameter resolution error"),
            FailureKind::Invocation => write!(f, "invocation error"),
            FailureKind::Panic => write!(f, "panicked"),
            FailureKind::Error => write!(f, "error"),
        }
    }
}

/// A failure raised while discovering or executing tests.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    kind: FailureKind,
    message: String,
    #[source]
    cause: Option<Box<Failure>>,
    suppressed: Vec<Failure>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            suppressed: Vec::new(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Assertion, message)
    }

    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Aborted, reason)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Configuration, message)
    }

    pub fn parameter_resolution(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ParameterResolution, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Error, message)
    }

    /// Wrap `cause` the way a dynamic invocation layer would.
    pub fn invocation(cause: Failure) -> Self {
        Self::new(FailureKind::Invocation, "invocation target failed").with_cause(cause)
    }

    /// Convert a panic payload. A `Failure` raised with `std::panic::panic_any` is recovered as-is.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<Failure>() {
            Ok(failure) => return *failure,
            Err(other) => other,
        };
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(FailureKind::Panic, message)
    }

    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Failure> {
        self.cause.as_deref()
    }

    pub fn suppressed(&self) -> &[Failure] {
        &self.suppressed
    }

    /// Attach `other` as suppressed, keeping insertion order.
    pub fn add_suppressed(&mut self, other: Failure) {
        self.suppressed.push(other);
    }

    pub fn is_aborted(&self) -> bool {
        self.kind == FailureKind::Aborted
    }

    /// Strip exactly one level of invocation wrapper.
    ///
    /// A wrapper without a cause is returned unchanged. Suppressed failures of the wrapper move to the
    /// unwrapped cause.
    pub fn unwrap_invocation(self) -> Self {
        if self.kind != FailureKind::Invocation {
            return self;
        }
        match self.cause {
            Some(cause) => {
                let mut inner = *cause;
                inner.suppressed.extend(self.suppressed);
                inner
            }
            None => Self {
                kind: self.kind,
                message: self.message,
                cause: None,
                suppressed: self.suppressed,
            },
        }
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Self::error(format!("I/O error: {err}"))
    }
}

/// Run `f`, turning a panic into a [`Failure`].
pub fn catch<T>(f: impl FnOnce() -> Fallible<T>) -> Fallible<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(Failure::from_panic(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_includes_kind() {
        let failure = Failure::assertion("expected 3 but was 4");
        assert_eq!(failure.to_string(), "assertion failed: expected 3 but was 4");
    }

    #[test]
    fn test_suppressed_order_is_preserved() {
        let mut primary = Failure::error("A");
        primary.add_suppressed(Failure::error("B"));
        primary.add_suppressed(Failure::error("C"));
        let messages: Vec<_> = primary.suppressed().iter().map(Failure::message).collect();
        assert_eq!(messages, vec!["B", "C"]);
    }

    #[test]
    fn test_cause_is_error_source() {
        let failure = Failure::parameter_resolution("outer").with_cause(Failure::error("inner"));
        let source = failure.source().unwrap();
        assert_eq!(source.to_string(), "error: inner");
    }

    #[test]
    fn test_unwrap_invocation_one_level_only() {
        let inner = Failure::invocation(Failure::assertion("real"));
        let wrapped = Failure::invocation(inner.clone());
        assert_eq!(wrapped.unwrap_invocation(), inner);
        assert_eq!(inner.unwrap_invocation().kind(), FailureKind::Assertion);
    }

    #[test]
    fn test_unwrap_non_wrapper_is_identity() {
        let failure = Failure::aborted("not on CI");
        assert_eq!(failure.clone().unwrap_invocation(), failure);
    }

    #[test]
    fn test_catch_converts_string_panic() {
        let result: Fallible = catch(|| panic!("boom {}", 42));
        let failure = result.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Panic);
        assert_eq!(failure.message(), "boom 42");
    }

    #[test]
    fn test_catch_recovers_failure_payload() {
        let result: Fallible = catch(|| std::panic::panic_any(Failure::aborted("skip me")));
        assert!(result.unwrap_err().is_aborted());
    }

    #[test]
    fn test_catch_passes_through_ok() {
        assert_eq!(catch(|| Ok(7)).unwrap(), 7);
    }
}
