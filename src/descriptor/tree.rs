//! Arena storage for the descriptor tree.

use std::collections::HashMap;

use trellis_core::UniqueId;

use super::{FilterSubject, TestDescriptor, TestSource};

/// Index of a descriptor in its [`TestTree`]. Only meaningful for the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Slot<N> {
    descriptor: TestDescriptor,
    node: N,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
}

/// Descriptor tree with per-node engine payloads.
///
/// Slots are never reused: removing a node detaches it and its descendants, and their ids stay valid
/// (but report `contains == false`). Children keep insertion order.
#[derive(Debug)]
pub struct TestTree<N> {
    slots: Vec<Slot<N>>,
    index: HashMap<UniqueId, NodeId>,
}

impl<N> TestTree<N> {
    /// A tree holding only `root`.
    pub fn new(root: TestDescriptor, node: N) -> Self {
        let mut index = HashMap::new();
        index.insert(root.unique_id().clone(), NodeId(0));
        Self {
            slots: vec![Slot {
                descriptor: root,
                node,
                parent: None,
                children: Vec::new(),
                attached: true,
            }],
            index,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Attach a child under `parent`.
    ///
    /// Idempotent per unique id: if a node with the same id is already attached, it is returned and
    /// `descriptor`/`node` are dropped.
    pub fn add_child(&mut self, parent: NodeId, descriptor: TestDescriptor, node: N) -> NodeId {
        if let Some(existing) = self.index.get(descriptor.unique_id()) {
            return *existing;
        }
        let id = NodeId(self.slots.len());
        self.index.insert(descriptor.unique_id().clone(), id);
        self.slots.push(Slot {
            descriptor,
            node,
            parent: Some(parent),
            children: Vec::new(),
            attached: true,
        });
        self.slots[parent.0].children.push(id);
        id
    }

    /// Detach `id` and all of its descendants. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root() || !self.contains(id) {
            return false;
        }
        if let Some(parent) = self.slots[id.0].parent {
            self.slots[parent.0].children.retain(|child| *child != id);
        }
        for detached in self.descendants(id) {
            let slot = &mut self.slots[detached.0];
            slot.attached = false;
            self.index.remove(slot.descriptor.unique_id());
        }
        true
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots.get(id.0).is_some_and(|slot| slot.attached)
    }

    pub fn find(&self, unique_id: &UniqueId) -> Option<NodeId> {
        self.index.get(unique_id).copied()
    }

    pub fn descriptor(&self, id: NodeId) -> &TestDescriptor {
        &self.slots[id.0].descriptor
    }

    pub fn node(&self, id: NodeId) -> &N {
        &self.slots[id.0].node
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut N {
        &mut self.slots[id.0].node
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.0].children
    }

    /// `id` followed by its attached descendants, depth-first pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.slots[next.0].children.iter().rev().copied());
        }
        out
    }

    /// Ancestors of `id`, nearest first, root last.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// Number of attached nodes, root included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tags of `id` and all of its ancestors, own tags first, without duplicates.
    pub fn effective_tags(&self, id: NodeId) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for node in std::iter::once(id).chain(self.ancestors(id)) {
            for tag in self.descriptor(node).tags() {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        tags
    }

    /// Build the view post-discovery filters evaluate.
    pub fn filter_subject(&self, id: NodeId) -> FilterSubject<'_> {
        let class_name = std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|node| match self.descriptor(node).source() {
                Some(TestSource::Class { class_name } | TestSource::Method { class_name, .. }) => {
                    Some(class_name.as_str())
                }
                _ => None,
            });
        FilterSubject {
            descriptor: self.descriptor(id),
            class_name,
            effective_tags: self.effective_tags(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorType;

    fn descriptor(id: &UniqueId, segment: &str, kind: DescriptorType) -> TestDescriptor {
        TestDescriptor::new(id.append(segment), segment, kind)
    }

    fn sample() -> (TestTree<()>, NodeId, NodeId, NodeId) {
        let mut tree = TestTree::new(TestDescriptor::engine("trellis"), ());
        let engine_id = tree.descriptor(tree.root()).unique_id().clone();
        let class = tree.add_child(
            tree.root(),
            descriptor(&engine_id, "a.Calc", DescriptorType::Container).with_tags(vec!["math".into()]),
            (),
        );
        let class_id = tree.descriptor(class).unique_id().clone();
        let first = tree.add_child(class, descriptor(&class_id, "adds()", DescriptorType::Test), ());
        let second = tree.add_child(
            class,
            descriptor(&class_id, "divides()", DescriptorType::Test).with_tags(vec!["slow".into()]),
            (),
        );
        (tree, class, first, second)
    }

    #[test]
    fn test_add_child_is_idempotent_per_unique_id() {
        let (mut tree, class, first, _) = sample();
        let class_id = tree.descriptor(class).unique_id().clone();
        let again = tree.add_child(class, descriptor(&class_id, "adds()", DescriptorType::Test), ());
        assert_eq!(again, first);
        assert_eq!(tree.children(class).len(), 2);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let (mut tree, class, first, second) = sample();
        assert!(tree.remove(class));
        assert!(!tree.contains(class));
        assert!(!tree.contains(first));
        assert!(!tree.contains(second));
        assert!(tree.children(tree.root()).is_empty());
        assert_eq!(tree.len(), 1);
        assert!(!tree.remove(tree.root()));
    }

    #[test]
    fn test_descendants_are_preorder() {
        let (tree, class, first, second) = sample();
        assert_eq!(tree.descendants(tree.root()), vec![tree.root(), class, first, second]);
        assert_eq!(tree.ancestors(second).collect::<Vec<_>>(), vec![class, tree.root()]);
    }

    #[test]
    fn test_effective_tags_include_ancestors() {
        let (tree, _, _, second) = sample();
        assert_eq!(tree.effective_tags(second), vec!["slow", "math"]);
    }

    #[test]
    fn test_find_by_unique_id() {
        let (tree, _, first, _) = sample();
        let id = UniqueId::parse("trellis:a.Calc/adds()").unwrap();
        assert_eq!(tree.find(&id), Some(first));
    }
}
