//! Dynamic invocation of method bodies.

use trellis_core::{Fallible, Failure, catch};

use super::{Callable, Instance, Value};

/// Invokes a callable on an instance with arguments.
///
/// Whatever the callable raised comes back as a `Failure` with one level of invocation wrapper removed,
/// so classification (abort vs failure) sees the real cause.
pub trait Invoker {
    fn invoke(&self, callable: &Callable, instance: Option<&Instance>, args: &[Value]) -> Fallible<Option<Value>>;
}

/// Calls the callable in place and converts panics.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInvoker;

impl Invoker for DefaultInvoker {
    fn invoke(&self, callable: &Callable, instance: Option<&Instance>, args: &[Value]) -> Fallible<Option<Value>> {
        catch(|| callable(instance, args)).map_err(Failure::unwrap_invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use trellis_core::FailureKind;

    #[test]
    fn test_wrapper_is_unwrapped() {
        let callable: Callable = Rc::new(|_: Option<&Instance>, _: &[Value]| -> Fallible<Option<Value>> { Err(Failure::invocation(Failure::aborted("no network"))) });
        let err = DefaultInvoker.invoke(&callable, None, &[]).unwrap_err();
        assert!(err.is_aborted());
    }

    #[test]
    fn test_panic_becomes_failure() {
        let callable: Callable = Rc::new(|_: Option<&Instance>, _: &[Value]| -> Fallible<Option<Value>> { panic!("kaboom") });
        let err = DefaultInvoker.invoke(&callable, None, &[]).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Panic);
        assert_eq!(err.message(), "kaboom");
    }

    #[test]
    fn test_value_is_returned() {
        let callable: Callable = Rc::new(|_: Option<&Instance>, args: &[Value]| -> Fallible<Option<Value>> { Ok(args.first().cloned()) });
        let arg: Value = Rc::new(3_i32);
        let value = DefaultInvoker.invoke(&callable, None, &[arg]).unwrap().unwrap();
        assert_eq!(value.downcast_ref::<i32>(), Some(&3));
    }
}
