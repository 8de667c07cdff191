//! Extensions the engine registers on its root registry.

use std::rc::Rc;

use trellis_core::{Fallible, UniqueId};

use super::api::{ConditionEvaluation, ExecutionCondition, ParameterContext, ParameterResolver};
use super::context::{Element, ExtensionContext};
use crate::model::{Annotated, Value};

/// Disables elements carrying [`Marker::Disabled`](crate::model::Marker::Disabled).
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCondition;

impl ExecutionCondition for DisabledCondition {
    fn evaluate(&self, context: &ExtensionContext) -> ConditionEvaluation {
        let reason = match context.element() {
            Element::Class(class) => class.disabled_reason(),
            Element::Method { method, .. } => method.disabled_reason(),
            Element::Engine | Element::Dynamic { .. } => None,
        };
        match reason {
            Some(reason) if reason.trim().is_empty() => {
                ConditionEvaluation::disabled(format!("{} is disabled", context.display_name()))
            }
            Some(reason) => ConditionEvaluation::disabled(reason),
            None => ConditionEvaluation::Enabled,
        }
    }
}

/// Information about the currently executing node, injectable as a `TestInfo` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestInfo {
    pub display_name: String,
    pub unique_id: UniqueId,
    pub tags: Vec<String>,
}

/// Resolves parameters declared with type `TestInfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestInfoResolver;

impl TestInfoResolver {
    pub const TYPE_NAME: &'static str = "TestInfo";
}

impl ParameterResolver for TestInfoResolver {
    fn supports(&self, parameter: &ParameterContext<'_>, _context: &ExtensionContext) -> Fallible<bool> {
        Ok(parameter.type_name() == Self::TYPE_NAME)
    }

    fn resolve(&self, _parameter: &ParameterContext<'_>, context: &ExtensionContext) -> Fallible<Value> {
        Ok(Rc::new(TestInfo {
            display_name: context.display_name().to_string(),
            unique_id: context.unique_id().clone(),
            tags: context.effective_tags(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::ContextKind;
    use crate::model::{Parameter, TestClass, TestMethod};

    #[test]
    fn test_disabled_condition_reads_markers() {
        let class = Rc::new(TestClass::builder("a.Off").disabled("not today").build());
        let context = ExtensionContext::new(
            None,
            UniqueId::for_engine("trellis").append("a.Off"),
            "Off",
            ContextKind::Container,
            Element::Class(Rc::clone(&class)),
            Vec::new(),
        );
        assert_eq!(
            DisabledCondition.evaluate(&context),
            ConditionEvaluation::Disabled("not today".into())
        );

        let method = Rc::new(TestMethod::static_fn("m", |_| Ok(())));
        let enabled = ExtensionContext::new(
            None,
            UniqueId::for_engine("trellis").append("m()"),
            "m()",
            ContextKind::Test,
            Element::Method { class, method },
            Vec::new(),
        );
        assert_eq!(DisabledCondition.evaluate(&enabled), ConditionEvaluation::Enabled);
    }

    #[test]
    fn test_test_info_resolution() {
        let method = TestMethod::static_fn("m", |_| Ok(())).param(Parameter::new("info", "TestInfo"));
        let other = Parameter::new("n", "i32");
        let class = Rc::new(ExtensionContext::new(
            None,
            UniqueId::for_engine("trellis").append("a.B"),
            "B",
            ContextKind::Container,
            Element::Engine,
            vec!["db".into(), "fast".into()],
        ));
        let context = ExtensionContext::new(
            Some(class),
            UniqueId::for_engine("trellis").append("a.B").append("m(TestInfo)"),
            "m(TestInfo)",
            ContextKind::Test,
            Element::Engine,
            vec!["fast".into()],
        );
        let supported = ParameterContext {
            parameter: &method.parameters()[0],
            index: 0,
            method: &method,
            class_name: "a.B",
        };
        let unsupported = ParameterContext {
            parameter: &other,
            ..supported
        };
        assert!(TestInfoResolver.supports(&supported, &context).unwrap());
        assert!(!TestInfoResolver.supports(&unsupported, &context).unwrap());

        let value = TestInfoResolver.resolve(&supported, &context).unwrap();
        let info = value.downcast_ref::<TestInfo>().unwrap();
        assert_eq!(info.display_name, "m(TestInfo)");
        assert_eq!(info.tags, vec!["fast", "db"]);
    }
}
