//! Method invocation with parameter resolution.

use tracing::trace;
use trellis_core::{Fallible, Failure, FailureKind, catch};

use crate::extension::{ApplicationOrder, ExtensionContext, ExtensionRegistry, ParameterContext, ParameterResolver};
use crate::model::{Instance, Invoker, TestClass, TestMethod, Value};

/// Invokes test and lifecycle methods, resolving every declared parameter through the registry.
pub struct MethodInvoker<'a> {
    registry: &'a ExtensionRegistry,
    invoker: &'a dyn Invoker,
}

impl<'a> MethodInvoker<'a> {
    pub fn new(registry: &'a ExtensionRegistry, invoker: &'a dyn Invoker) -> Self {
        Self { registry, invoker }
    }

    pub fn invoke(
        &self,
        class: &TestClass,
        method: &TestMethod,
        instance: Option<&Instance>,
        context: &ExtensionContext,
    ) -> Fallible<Option<Value>> {
        let args = self.resolve_parameters(class, method, context)?;
        self.invoker.invoke(method.body(), instance, &args)
    }

    pub fn resolve_parameters(
        &self,
        class: &TestClass,
        method: &TestMethod,
        context: &ExtensionContext,
    ) -> Fallible<Vec<Value>> {
        method
            .parameters()
            .iter()
            .enumerate()
            .map(|(index, parameter)| {
                let parameter_context = ParameterContext {
                    parameter,
                    index,
                    method,
                    class_name: class.name(),
                };
                self.resolve_parameter(&parameter_context, context)
                    .map_err(|cause| wrap_resolution_failure(cause, &parameter_context))
            })
            .collect()
    }

    fn resolve_parameter(&self, parameter: &ParameterContext<'_>, context: &ExtensionContext) -> Fallible<Value> {
        let mut matching = Vec::new();
        for registered in self.registry.points::<dyn ParameterResolver>(ApplicationOrder::Forward) {
            let _active = context.activate(registered.owner);
            if catch(|| registered.callback.supports(parameter, context))? {
                matching.push(registered);
            }
        }

        match matching.as_slice() {
            [] => Err(Failure::parameter_resolution(format!(
                "No ParameterResolver registered for parameter [{}] in method [{}].",
                parameter.parameter,
                describe(parameter)
            ))),
            [resolver] => {
                trace!(parameter = %parameter.parameter, resolver = %resolver.source, "resolving parameter");
                let _active = context.activate(resolver.owner);
                catch(|| resolver.callback.resolve(parameter, context))
            }
            competing => {
                let names: Vec<String> = competing.iter().map(|r| r.source.to_string()).collect();
                Err(Failure::parameter_resolution(format!(
                    "Discovered multiple competing ParameterResolvers for parameter [{}] in method [{}]: {}",
                    parameter.parameter,
                    describe(parameter),
                    names.join(", ")
                )))
            }
        }
    }
}

fn describe(parameter: &ParameterContext<'_>) -> String {
    format!("{}#{}", parameter.class_name, parameter.method.signature())
}

fn wrap_resolution_failure(cause: Failure, parameter: &ParameterContext<'_>) -> Failure {
    if cause.kind() == FailureKind::ParameterResolution {
        return cause;
    }
    Failure::parameter_resolution(format!(
        "Failed to resolve parameter [{}] in method [{}]",
        parameter.parameter,
        describe(parameter)
    ))
    .with_cause(cause)
}
