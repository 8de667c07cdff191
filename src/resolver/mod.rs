//! Turns a [`TestPlanSpecification`] into a descriptor tree.
//!
//! Each selector is resolved independently and best-effort: a selector that names nothing contributes no
//! nodes and is only logged. Resolution is idempotent per unique id, so overlapping selectors never
//! duplicate a node.
//!
//! Unique-id segments:
//! - classes (top-level and nested): the qualified class name
//! - methods: the signature with parameter types, e.g. `adds(i32, i32)`
//!
//! After all selectors are resolved the post-discovery filters prune the tree bottom-up.

mod specification;

pub use specification::{Selector, TestPlanSpecification, TestPlanSpecificationBuilder};

use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, warn};
use trellis_core::UniqueId;

use crate::descriptor::{DescriptorType, NodeId, PostDiscoveryFilter, TestDescriptor, TestSource, TestTree};
use crate::engine::TrellisNode;
use crate::model::{Annotated, ClassEntry, ClassSource, Classifier, TestClass, TestMethod};

/// Resolves selectors against a [`ClassSource`], classifying elements with a [`Classifier`].
pub struct SpecificationResolver<'a> {
    engine_id: &'a str,
    source: &'a dyn ClassSource,
    classifier: &'a dyn Classifier,
}

impl<'a> SpecificationResolver<'a> {
    pub fn new(engine_id: &'a str, source: &'a dyn ClassSource, classifier: &'a dyn Classifier) -> Self {
        Self {
            engine_id,
            source,
            classifier,
        }
    }

    #[tracing::instrument(skip_all, fields(engine = self.engine_id, selectors = specification.selectors().len()))]
    pub fn resolve(&self, specification: &TestPlanSpecification) -> TestTree<TrellisNode> {
        let mut resolution = Resolution {
            tree: TestTree::new(TestDescriptor::engine(self.engine_id), TrellisNode::Engine),
            selected: HashSet::new(),
        };
        for selector in specification.selectors() {
            let before = resolution.tree.len();
            self.resolve_selector(&mut resolution, selector);
            if resolution.tree.len() == before {
                debug!(%selector, "selector contributed no new nodes");
            }
        }
        prune(&mut resolution, specification.filters());
        debug!(nodes = resolution.tree.len(), "resolution finished");
        resolution.tree
    }

    fn resolve_selector(&self, resolution: &mut Resolution, selector: &Selector) {
        match selector {
            Selector::Class(name) => {
                let Some(entry) = self.source.find_class(name) else {
                    debug!(class = %name, "class not found");
                    return;
                };
                if let Some(id) = self.resolve_class_entry(resolution, &entry) {
                    resolution.selected.insert(id);
                }
            }
            Selector::Method {
                class_name,
                method_name,
                parameter_types,
            } => {
                let Some(entry) = self.source.find_class(class_name) else {
                    debug!(class = %class_name, "class not found");
                    return;
                };
                let method = entry.class.methods().iter().find(|m| {
                    m.name() == method_name
                        && parameter_types.as_ref().is_none_or(|types| {
                            m.parameters().iter().map(|p| p.type_name.as_str()).eq(types.iter().map(String::as_str))
                        })
                });
                let Some(method) = method.filter(|m| self.is_testable(m)) else {
                    debug!(class = %class_name, method = %method_name, "no such test method");
                    return;
                };
                let Some(parent) = self.resolve_enclosing_chain(resolution, &entry) else {
                    return;
                };
                let id = self.add_method(resolution, parent, &entry.enclosing, &entry.class, method);
                resolution.selected.insert(id);
            }
            Selector::Package(package) => {
                for class in self.source.classes_in_package(package) {
                    self.resolve_top_level(resolution, class);
                }
            }
            Selector::ClasspathRoot(root) => {
                for class in self.source.classes_in_root(root) {
                    self.resolve_top_level(resolution, class);
                }
            }
            Selector::UniqueId(unique_id) => self.resolve_unique_id(resolution, unique_id),
        }
    }

    fn is_testable(&self, method: &TestMethod) -> bool {
        self.classifier.is_test_method(method) || self.classifier.is_test_factory(method)
    }

    fn resolve_top_level(&self, resolution: &mut Resolution, class: Rc<TestClass>) {
        if !self.classifier.is_test_class(&class) {
            debug!(class = class.name(), "not a test class");
            return;
        }
        let root = resolution.tree.root();
        self.add_class_with_children(resolution, root, Vec::new(), &class);
    }

    /// Resolve a looked-up class with all its children, creating its enclosing containers as needed.
    fn resolve_class_entry(&self, resolution: &mut Resolution, entry: &ClassEntry) -> Option<NodeId> {
        if !self.classifier.is_test_class(&entry.class) {
            debug!(class = entry.class.name(), "not a test class");
            return None;
        }
        if entry.is_nested() && !self.classifier.is_nested_class(&entry.class) {
            debug!(class = entry.class.name(), "member class is not a nested test class");
            return None;
        }
        let parent = self.resolve_enclosing(resolution, &entry.enclosing)?;
        Some(self.add_class_with_children(resolution, parent, entry.enclosing.clone(), &entry.class))
    }

    /// Containers for the enclosing classes of `entry` and for `entry.class` itself, without children.
    fn resolve_enclosing_chain(&self, resolution: &mut Resolution, entry: &ClassEntry) -> Option<NodeId> {
        if !self.classifier.is_test_class(&entry.class) {
            return None;
        }
        if entry.is_nested() && !self.classifier.is_nested_class(&entry.class) {
            return None;
        }
        let parent = self.resolve_enclosing(resolution, &entry.enclosing)?;
        Some(self.add_class(resolution, parent, entry.enclosing.clone(), &entry.class))
    }

    fn resolve_enclosing(&self, resolution: &mut Resolution, enclosing: &[Rc<TestClass>]) -> Option<NodeId> {
        let mut parent = resolution.tree.root();
        for (depth, class) in enclosing.iter().enumerate() {
            if depth > 0 && !self.classifier.is_nested_class(class) {
                debug!(class = class.name(), "enclosing member class is not a nested test class");
                return None;
            }
            parent = self.add_class(resolution, parent, enclosing[..depth].to_vec(), class);
        }
        Some(parent)
    }

    fn resolve_unique_id(&self, resolution: &mut Resolution, unique_id: &UniqueId) {
        if unique_id.engine_id() != self.engine_id {
            warn!(%unique_id, engine = self.engine_id, "unique id belongs to another engine");
            return;
        }
        let segments = unique_id.segments();
        let Some((first, rest)) = segments.split_first() else {
            // the engine root itself: nothing to add
            return;
        };
        let Some(entry) = self.source.find_class(first).filter(|entry| !entry.is_nested()) else {
            debug!(%unique_id, "no top-level class for unique id");
            return;
        };
        let mut chain: Vec<Rc<TestClass>> = Vec::new();
        let mut class = entry.class;
        let mut remaining = rest;
        while let Some((segment, tail)) = remaining.split_first() {
            if let Some(nested) = class
                .nested_classes()
                .iter()
                .find(|nested| nested.name() == segment.as_str())
                .filter(|nested| self.classifier.is_nested_class(nested))
                .cloned()
            {
                chain.push(Rc::clone(&class));
                class = nested;
                remaining = tail;
                continue;
            }
            if !tail.is_empty() {
                debug!(%unique_id, %segment, "dynamic or unknown segment; resolving the nearest static node");
            }
            let Some(method) = class
                .methods()
                .iter()
                .find(|m| m.signature() == segment.as_str() && self.is_testable(m))
                .cloned()
            else {
                debug!(%unique_id, %segment, "no test method for segment");
                return;
            };
            let entry = ClassEntry { class, enclosing: chain };
            let Some(parent) = self.resolve_enclosing_chain(resolution, &entry) else {
                return;
            };
            let id = self.add_method(resolution, parent, &entry.enclosing, &entry.class, &method);
            resolution.selected.insert(id);
            return;
        }
        let entry = ClassEntry { class, enclosing: chain };
        if let Some(id) = self.resolve_class_entry(resolution, &entry) {
            resolution.selected.insert(id);
        }
    }

    fn add_class(
        &self,
        resolution: &mut Resolution,
        parent: NodeId,
        enclosing: Vec<Rc<TestClass>>,
        class: &Rc<TestClass>,
    ) -> NodeId {
        let unique_id = resolution.tree.descriptor(parent).unique_id().append(class.name());
        let display_name = class.declared_display_name().unwrap_or(class.simple_name());
        let descriptor = TestDescriptor::new(unique_id, display_name, DescriptorType::Container)
            .with_tags(class.tags())
            .with_source(TestSource::Class {
                class_name: class.name().to_string(),
            });
        resolution.tree.add_child(
            parent,
            descriptor,
            TrellisNode::Class {
                class: Rc::clone(class),
                enclosing,
            },
        )
    }

    fn add_class_with_children(
        &self,
        resolution: &mut Resolution,
        parent: NodeId,
        enclosing: Vec<Rc<TestClass>>,
        class: &Rc<TestClass>,
    ) -> NodeId {
        let id = self.add_class(resolution, parent, enclosing.clone(), class);
        for method in class.methods().iter().filter(|m| self.is_testable(m)) {
            self.add_method(resolution, id, &enclosing, class, method);
        }
        let mut inner_enclosing = enclosing;
        inner_enclosing.push(Rc::clone(class));
        for nested in class.nested_classes() {
            if self.classifier.is_nested_class(nested) && self.classifier.is_test_class(nested) {
                self.add_class_with_children(resolution, id, inner_enclosing.clone(), nested);
            }
        }
        id
    }

    fn add_method(
        &self,
        resolution: &mut Resolution,
        parent: NodeId,
        enclosing: &[Rc<TestClass>],
        class: &Rc<TestClass>,
        method: &Rc<TestMethod>,
    ) -> NodeId {
        let signature = method.signature();
        let unique_id = resolution.tree.descriptor(parent).unique_id().append(signature.clone());
        let factory = self.classifier.is_test_factory(method);
        let descriptor_type = if factory {
            DescriptorType::ContainerAndTest
        } else {
            DescriptorType::Test
        };
        let display_name = method.declared_display_name().map_or_else(|| signature.clone(), String::from);
        let descriptor = TestDescriptor::new(unique_id, display_name, descriptor_type)
            .with_tags(method.tags())
            .with_source(TestSource::Method {
                class_name: class.name().to_string(),
                signature,
            });
        resolution.tree.add_child(
            parent,
            descriptor,
            TrellisNode::Method {
                class: Rc::clone(class),
                enclosing: enclosing.to_vec(),
                method: Rc::clone(method),
                factory,
            },
        )
    }
}

struct Resolution {
    tree: TestTree<TrellisNode>,
    /// Nodes named directly by a class, method or unique-id selector.
    selected: HashSet<NodeId>,
}

/// Remove tests rejected by any filter, then containers left without children.
///
/// A container that lost all of its children is removed unless it was selected directly; a container
/// that never had children is kept only if it passes the filters itself. The engine root always stays.
fn prune(resolution: &mut Resolution, filters: &[PostDiscoveryFilter]) {
    let root = resolution.tree.root();
    for child in resolution.tree.children(root).to_vec() {
        if !retain(resolution, child, filters) {
            resolution.tree.remove(child);
        }
    }
}

fn retain(resolution: &mut Resolution, id: NodeId, filters: &[PostDiscoveryFilter]) -> bool {
    let had_children = !resolution.tree.children(id).is_empty();
    for child in resolution.tree.children(id).to_vec() {
        if !retain(resolution, child, filters) {
            resolution.tree.remove(child);
        }
    }

    let accepted = {
        let subject = resolution.tree.filter_subject(id);
        filters.iter().all(|filter| filter.accepts(&subject))
    };
    let descriptor = resolution.tree.descriptor(id);
    if descriptor.is_test() {
        if !accepted {
            debug!(id = %descriptor.unique_id(), "filtered out");
        }
        return accepted;
    }
    if !resolution.tree.children(id).is_empty() || resolution.selected.contains(&id) {
        return true;
    }
    if had_children {
        debug!(id = %descriptor.unique_id(), "container left without children");
        return false;
    }
    accepted
}
