//! The plan-level, engine-independent view of discovered tests.

use std::collections::HashMap;

use trellis_core::UniqueId;

use crate::descriptor::{DescriptorType, TestDescriptor, TestSource};

/// Immutable snapshot of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIdentifier {
    unique_id: UniqueId,
    parent_id: Option<UniqueId>,
    display_name: String,
    descriptor_type: DescriptorType,
    tags: Vec<String>,
    source: Option<TestSource>,
}

impl TestIdentifier {
    pub fn from_descriptor(descriptor: &TestDescriptor) -> Self {
        Self {
            unique_id: descriptor.unique_id().clone(),
            parent_id: descriptor.unique_id().parent(),
            display_name: descriptor.display_name().to_string(),
            descriptor_type: descriptor.descriptor_type(),
            tags: descriptor.tags().to_vec(),
            source: descriptor.source().cloned(),
        }
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn parent_id(&self) -> Option<&UniqueId> {
        self.parent_id.as_ref()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_test(&self) -> bool {
        self.descriptor_type.is_test()
    }

    pub fn is_container(&self) -> bool {
        self.descriptor_type.is_container()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn source(&self) -> Option<&TestSource> {
        self.source.as_ref()
    }
}

/// All identifiers of a discovery, engine roots first. Grows only when dynamic tests are registered.
#[derive(Debug, Clone, Default)]
pub struct TestPlan {
    roots: Vec<UniqueId>,
    identifiers: HashMap<UniqueId, TestIdentifier>,
    children: HashMap<UniqueId, Vec<UniqueId>>,
}

impl TestPlan {
    /// Build a plan from descriptors given parent-before-child.
    pub fn from_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a TestDescriptor>) -> Self {
        let mut plan = Self::default();
        for descriptor in descriptors {
            plan.add(TestIdentifier::from_descriptor(descriptor));
        }
        plan
    }

    pub(crate) fn add(&mut self, identifier: TestIdentifier) {
        if self.identifiers.contains_key(identifier.unique_id()) {
            return;
        }
        match identifier.parent_id() {
            Some(parent) => self
                .children
                .entry(parent.clone())
                .or_default()
                .push(identifier.unique_id().clone()),
            None => self.roots.push(identifier.unique_id().clone()),
        }
        self.identifiers.insert(identifier.unique_id().clone(), identifier);
    }

    pub(crate) fn merge(&mut self, other: TestPlan) {
        for root in &other.roots {
            for identifier in other.descendants(root) {
                self.add(identifier.clone());
            }
        }
    }

    /// Engine roots in discovery order.
    pub fn roots(&self) -> Vec<&TestIdentifier> {
        self.roots.iter().filter_map(|id| self.identifiers.get(id)).collect()
    }

    pub fn identifier(&self, unique_id: &UniqueId) -> Option<&TestIdentifier> {
        self.identifiers.get(unique_id)
    }

    pub fn children(&self, unique_id: &UniqueId) -> Vec<&TestIdentifier> {
        self.children
            .get(unique_id)
            .map(|ids| ids.iter().filter_map(|id| self.identifiers.get(id)).collect())
            .unwrap_or_default()
    }

    /// `unique_id` and everything below it, depth-first pre-order.
    pub fn descendants(&self, unique_id: &UniqueId) -> Vec<&TestIdentifier> {
        let mut out = Vec::new();
        let mut stack = vec![unique_id];
        while let Some(next) = stack.pop() {
            if let Some(identifier) = self.identifiers.get(next) {
                out.push(identifier);
            }
            if let Some(children) = self.children.get(next) {
                stack.extend(children.iter().rev());
            }
        }
        out
    }

    pub fn count_tests(&self) -> usize {
        self.identifiers.values().filter(|id| id.is_test()).count()
    }

    pub fn contains_tests(&self) -> bool {
        self.identifiers.values().any(TestIdentifier::is_test)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> TestPlan {
        let engine = TestDescriptor::engine("trellis");
        let class = TestDescriptor::new(engine.unique_id().append("a.Calc"), "Calc", DescriptorType::Container);
        let adds = TestDescriptor::new(class.unique_id().append("adds()"), "adds()", DescriptorType::Test);
        let factory = TestDescriptor::new(
            class.unique_id().append("cases()"),
            "cases()",
            DescriptorType::ContainerAndTest,
        );
        TestPlan::from_descriptors([&engine, &class, &adds, &factory])
    }

    #[test]
    fn test_structure() {
        let plan = plan();
        assert_eq!(plan.roots().len(), 1);
        assert_eq!(plan.count_tests(), 2);
        let class_id = UniqueId::parse("trellis:a.Calc").unwrap();
        let names: Vec<&str> = plan.children(&class_id).iter().map(|i| i.display_name()).collect();
        assert_eq!(names, vec!["adds()", "cases()"]);
        assert_eq!(plan.descendants(plan.roots()[0].unique_id()).len(), 4);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut plan = plan();
        let again = plan.roots()[0].clone();
        plan.add(again);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.roots().len(), 1);
    }
}
