//! The hierarchical extension context and its scoped store.
//!
//! One context exists per executing node; its parent is the context of the parent node. Every store entry
//! is owned by the extension that was active when it was written, so two independently-authored
//! extensions using the same key never see each other's values.
//!
//! Lookup rules:
//! - an entry is found in the context it was stored in, whatever its [`Visibility`]
//! - from a descendant context, only [`Visibility::Default`] entries are found
//! - only the owning extension ever finds an entry
//!
//! A key stored in one context with one visibility cannot be stored again in the same context with the
//! other visibility; that is reported as [`ContextError::VisibilityConflict`].

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use miette::Diagnostic;
use thiserror::Error;
use trellis_core::{Failure, UniqueId};

use super::ExtensionRegistry;
use crate::model::{Instance, TestClass, TestMethod, Value};

/// Identity of a registered extension (or lifecycle method) within one registry chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionId(pub(crate) u32);

impl ExtensionId {
    pub fn value(self) -> u32 {
        self.0
    }
}

/// Scoping rule of a store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Visible from this context and all descendant contexts, to the owning extension.
    #[default]
    Default,
    /// Visible only from the context it was stored in.
    Local,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ContextError {
    #[error("no extension is active on context '{unique_id}'")]
    #[diagnostic(
        code(trellis::context::no_active_extension),
        help("store access is only possible from inside an extension callback")
    )]
    NoActiveExtension { unique_id: String },

    #[error("key '{key}' is already stored with {existing:?} visibility on context '{unique_id}'")]
    #[diagnostic(
        code(trellis::context::visibility_conflict),
        help("a key keeps the visibility it was first stored with; remove it first or use another key")
    )]
    VisibilityConflict {
        key: String,
        existing: Visibility,
        unique_id: String,
    },
}

impl From<ContextError> for Failure {
    fn from(err: ContextError) -> Self {
        Failure::configuration(err.to_string())
    }
}

/// What kind of node a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Engine,
    Container,
    Test,
}

/// The element a context was created for.
#[derive(Debug, Clone)]
pub enum Element {
    Engine,
    Class(Rc<TestClass>),
    Method { class: Rc<TestClass>, method: Rc<TestMethod> },
    Dynamic { factory: Rc<TestMethod>, display_name: String },
}

/// The instances a test runs against, outermost enclosing instance first.
#[derive(Debug, Clone, Default)]
pub struct TestInstances {
    chain: Vec<(String, Instance)>,
}

impl TestInstances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, class_name: impl Into<String>, instance: Instance) {
        self.chain.push((class_name.into(), instance));
    }

    /// The instance of the class declaring the test.
    pub fn innermost(&self) -> Option<&Instance> {
        self.chain.last().map(|(_, instance)| instance)
    }

    pub fn find(&self, class_name: &str) -> Option<&Instance> {
        self.chain
            .iter()
            .find(|(name, _)| name == class_name)
            .map(|(_, instance)| instance)
    }

    pub fn all(&self) -> impl Iterator<Item = &Instance> {
        self.chain.iter().map(|(_, instance)| instance)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    visibility: Visibility,
}

/// Context handed to every extension callback.
pub struct ExtensionContext {
    parent: Option<Rc<ExtensionContext>>,
    unique_id: UniqueId,
    display_name: String,
    kind: ContextKind,
    element: Element,
    tags: Vec<String>,
    test_instances: RefCell<Option<TestInstances>>,
    registry: OnceCell<Rc<ExtensionRegistry>>,
    active: Cell<Option<ExtensionId>>,
    entries: RefCell<HashMap<(ExtensionId, String), Entry>>,
}

impl ExtensionContext {
    pub fn new(
        parent: Option<Rc<ExtensionContext>>,
        unique_id: UniqueId,
        display_name: impl Into<String>,
        kind: ContextKind,
        element: Element,
        tags: Vec<String>,
    ) -> Self {
        Self {
            parent,
            unique_id,
            display_name: display_name.into(),
            kind,
            element,
            tags,
            test_instances: RefCell::new(None),
            registry: OnceCell::new(),
            active: Cell::new(None),
            entries: RefCell::new(HashMap::new()),
        }
    }

    pub fn parent(&self) -> Option<&Rc<ExtensionContext>> {
        self.parent.as_ref()
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Tags of this context and all of its ancestors, own tags first, without duplicates.
    pub fn effective_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let mut current = Some(self);
        while let Some(context) = current {
            for tag in &context.tags {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
            current = context.parent.as_deref();
        }
        tags
    }

    /// Instances of the current test; inherited from the nearest context that has them.
    pub fn test_instances(&self) -> Option<TestInstances> {
        if let Some(instances) = self.test_instances.borrow().as_ref() {
            return Some(instances.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.test_instances())
    }

    /// Instance of the innermost test class, the usual receiver for callbacks.
    pub fn test_instance(&self) -> Option<Instance> {
        self.test_instances()
            .and_then(|instances| instances.innermost().cloned())
    }

    pub(crate) fn set_test_instances(&self, instances: TestInstances) {
        *self.test_instances.borrow_mut() = Some(instances);
    }

    /// The registry of the node this context belongs to; lifecycle methods resolve parameters against it.
    pub(crate) fn registry(&self) -> Option<&Rc<ExtensionRegistry>> {
        self.registry.get()
    }

    pub(crate) fn attach_registry(&self, registry: Rc<ExtensionRegistry>) {
        // a context is attached once, right after creation
        let _ = self.registry.set(registry);
    }

    /// Mark `owner` as the executing extension until the guard is dropped.
    pub fn activate(&self, owner: ExtensionId) -> ActiveExtension<'_> {
        let previous = self.active.replace(Some(owner));
        ActiveExtension { context: self, previous }
    }

    pub fn active_extension(&self) -> Option<ExtensionId> {
        self.active.get()
    }

    fn owner(&self) -> Result<ExtensionId, ContextError> {
        self.active.get().ok_or_else(|| ContextError::NoActiveExtension {
            unique_id: self.unique_id.to_string(),
        })
    }

    /// Store `value` under `key` for the active extension; returns the value it replaced.
    pub fn store(
        &self,
        key: impl Into<String>,
        value: Value,
        visibility: Visibility,
    ) -> Result<Option<Value>, ContextError> {
        let owner = self.owner()?;
        let key = key.into();
        let mut entries = self.entries.borrow_mut();
        match entries.get(&(owner, key.clone())) {
            Some(existing) if existing.visibility != visibility => {
                return Err(ContextError::VisibilityConflict {
                    key,
                    existing: existing.visibility,
                    unique_id: self.unique_id.to_string(),
                });
            }
            _ => {}
        }
        let previous = entries.insert((owner, key), Entry { value, visibility });
        Ok(previous.map(|entry| entry.value))
    }

    /// Look `key` up for the active extension, here and then in ancestor contexts.
    pub fn get(&self, key: &str) -> Result<Option<Value>, ContextError> {
        let owner = self.owner()?;
        Ok(self.lookup(owner, key))
    }

    /// Like [`get`](Self::get), downcasting to `T`. A value of another type counts as absent.
    pub fn get_as<T: 'static>(&self, key: &str) -> Result<Option<Rc<T>>, ContextError> {
        Ok(self.get(key)?.and_then(|value| value.downcast::<T>().ok()))
    }

    /// Return the visible value for `key`, storing `make()` in this context first if there is none.
    pub fn get_or_insert_with(
        &self,
        key: impl Into<String>,
        visibility: Visibility,
        make: impl FnOnce() -> Value,
    ) -> Result<Value, ContextError> {
        let key = key.into();
        let owner = self.owner()?;
        if let Some(value) = self.lookup(owner, &key) {
            return Ok(value);
        }
        let value = make();
        self.store(key, Rc::clone(&value), visibility)?;
        Ok(value)
    }

    /// Remove the active extension's entry from this context only.
    pub fn remove(&self, key: &str) -> Result<Option<Value>, ContextError> {
        let owner = self.owner()?;
        let removed = self.entries.borrow_mut().remove(&(owner, key.to_string()));
        Ok(removed.map(|entry| entry.value))
    }

    fn lookup(&self, owner: ExtensionId, key: &str) -> Option<Value> {
        let id = (owner, key.to_string());
        if let Some(entry) = self.entries.borrow().get(&id) {
            return Some(Rc::clone(&entry.value));
        }
        let mut ancestor = self.parent.as_deref();
        while let Some(context) = ancestor {
            match context.entries.borrow().get(&id) {
                Some(entry) if entry.visibility == Visibility::Default => return Some(Rc::clone(&entry.value)),
                _ => {}
            }
            ancestor = context.parent.as_deref();
        }
        None
    }
}

impl std::fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("unique_id", &self.unique_id.to_string())
            .field("kind", &self.kind)
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}

/// Restores the previously active extension when dropped.
#[must_use = "the extension is only active while the guard is alive"]
pub struct ActiveExtension<'a> {
    context: &'a ExtensionContext,
    previous: Option<ExtensionId>,
}

impl Drop for ActiveExtension<'_> {
    fn drop(&mut self) {
        self.context.active.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: ExtensionId = ExtensionId(1);
    const SECOND: ExtensionId = ExtensionId(2);

    fn context(parent: Option<Rc<ExtensionContext>>, segment: &str) -> Rc<ExtensionContext> {
        let unique_id = match &parent {
            Some(p) => p.unique_id().append(segment),
            None => UniqueId::for_engine("trellis"),
        };
        Rc::new(ExtensionContext::new(
            parent,
            unique_id,
            segment,
            ContextKind::Container,
            Element::Engine,
            Vec::new(),
        ))
    }

    fn int(value: i32) -> Value {
        Rc::new(value)
    }

    #[test]
    fn test_store_requires_active_extension() {
        let root = context(None, "engine");
        let err = root.store("k", int(1), Visibility::Default).unwrap_err();
        assert!(matches!(err, ContextError::NoActiveExtension { .. }));
    }

    #[test]
    fn test_default_visibility_is_inherited_by_owner_only() {
        let root = context(None, "engine");
        let child = context(Some(Rc::clone(&root)), "a.Class");
        {
            let _guard = root.activate(FIRST);
            root.store("k", int(1), Visibility::Default).unwrap();
        }
        {
            let _guard = child.activate(FIRST);
            assert_eq!(child.get_as::<i32>("k").unwrap().as_deref(), Some(&1));
        }
        {
            let _guard = child.activate(SECOND);
            assert!(child.get("k").unwrap().is_none());
        }
        let _guard = root.activate(SECOND);
        assert!(root.get("k").unwrap().is_none());
    }

    #[test]
    fn test_local_visibility_is_not_inherited() {
        let root = context(None, "engine");
        let child = context(Some(Rc::clone(&root)), "a.Class");
        let _root_guard = root.activate(FIRST);
        root.store("k", int(1), Visibility::Local).unwrap();
        assert!(root.get("k").unwrap().is_some());

        let _child_guard = child.activate(FIRST);
        assert!(child.get("k").unwrap().is_none());
    }

    #[test]
    fn test_visibility_conflict_in_same_context() {
        let root = context(None, "engine");
        let _guard = root.activate(FIRST);
        root.store("k", int(1), Visibility::Default).unwrap();
        let err = root.store("k", int(2), Visibility::Local).unwrap_err();
        assert!(matches!(
            err,
            ContextError::VisibilityConflict {
                existing: Visibility::Default,
                ..
            }
        ));
        // same visibility replaces
        let previous = root.store("k", int(3), Visibility::Default).unwrap().unwrap();
        assert_eq!(previous.downcast_ref::<i32>(), Some(&1));
    }

    #[test]
    fn test_child_may_shadow_with_other_visibility() {
        let root = context(None, "engine");
        let child = context(Some(Rc::clone(&root)), "a.Class");
        {
            let _guard = root.activate(FIRST);
            root.store("k", int(1), Visibility::Default).unwrap();
        }
        let _guard = child.activate(FIRST);
        child.store("k", int(2), Visibility::Local).unwrap();
        assert_eq!(child.get_as::<i32>("k").unwrap().as_deref(), Some(&2));
    }

    #[test]
    fn test_get_or_insert_with_and_remove() {
        let root = context(None, "engine");
        let child = context(Some(Rc::clone(&root)), "a.Class");
        {
            let _guard = root.activate(FIRST);
            root.store("k", int(1), Visibility::Default).unwrap();
        }
        let _guard = child.activate(FIRST);
        let found = child.get_or_insert_with("k", Visibility::Default, || int(9)).unwrap();
        assert_eq!(found.downcast_ref::<i32>(), Some(&1));
        let made = child.get_or_insert_with("other", Visibility::Local, || int(9)).unwrap();
        assert_eq!(made.downcast_ref::<i32>(), Some(&9));

        // removal only touches the own context
        assert!(child.remove("k").unwrap().is_none());
        assert!(child.remove("other").unwrap().is_some());
        assert!(child.get("other").unwrap().is_none());
    }

    #[test]
    fn test_activation_guard_restores_previous() {
        let root = context(None, "engine");
        let outer = root.activate(FIRST);
        {
            let _inner = root.activate(SECOND);
            assert_eq!(root.active_extension(), Some(SECOND));
        }
        assert_eq!(root.active_extension(), Some(FIRST));
        drop(outer);
        assert_eq!(root.active_extension(), None);
    }

    #[test]
    fn test_instances_are_inherited() {
        let root = context(None, "engine");
        let child = context(Some(Rc::clone(&root)), "t()");
        let mut instances = TestInstances::new();
        instances.push("a.Outer", Rc::new(1_i32) as Instance);
        instances.push("a.Outer$Inner", Rc::new(2_i32) as Instance);
        root.set_test_instances(instances);
        let inherited = child.test_instances().unwrap();
        assert_eq!(inherited.len(), 2);
        assert_eq!(inherited.find("a.Outer").unwrap().downcast_ref::<i32>(), Some(&1));
        assert_eq!(child.test_instance().unwrap().downcast_ref::<i32>(), Some(&2));
    }
}
