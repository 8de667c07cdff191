//! Class lookup: the scanner collaborator and its in-memory implementation.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use super::TestClass;

/// A class found by a lookup, with its enclosing classes from outermost to innermost.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    pub class: Rc<TestClass>,
    pub enclosing: Vec<Rc<TestClass>>,
}

impl ClassEntry {
    pub fn is_nested(&self) -> bool {
        !self.enclosing.is_empty()
    }
}

/// Enumerates candidate classes. Implementations perform no classification.
pub trait ClassSource {
    /// Find a top-level or nested class by its qualified name.
    fn find_class(&self, name: &str) -> Option<ClassEntry>;

    /// Top-level classes in `package` or any of its sub-packages, in registration order.
    fn classes_in_package(&self, package: &str) -> Vec<Rc<TestClass>>;

    /// Top-level classes loaded from `root`, in registration order.
    fn classes_in_root(&self, root: &Path) -> Vec<Rc<TestClass>>;
}

/// In-memory class registry.
#[derive(Debug, Default)]
pub struct Catalog {
    top_level: Vec<Rc<TestClass>>,
    by_name: HashMap<String, ClassEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a top-level class (nested classes are indexed along with it).
    pub fn register(&mut self, class: TestClass) -> Rc<TestClass> {
        let class = Rc::new(class);
        self.index(&class, &[]);
        self.top_level.push(Rc::clone(&class));
        class
    }

    pub fn with(mut self, class: TestClass) -> Self {
        self.register(class);
        self
    }

    pub fn classes(&self) -> &[Rc<TestClass>] {
        &self.top_level
    }

    fn index(&mut self, class: &Rc<TestClass>, enclosing: &[Rc<TestClass>]) {
        self.by_name.insert(
            class.name().to_string(),
            ClassEntry {
                class: Rc::clone(class),
                enclosing: enclosing.to_vec(),
            },
        );
        let mut chain = enclosing.to_vec();
        chain.push(Rc::clone(class));
        for nested in class.nested_classes() {
            self.index(nested, &chain);
        }
    }
}

impl ClassSource for Catalog {
    fn find_class(&self, name: &str) -> Option<ClassEntry> {
        self.by_name.get(name).cloned()
    }

    fn classes_in_package(&self, package: &str) -> Vec<Rc<TestClass>> {
        self.top_level
            .iter()
            .filter(|class| package_contains(package, class.package()))
            .cloned()
            .collect()
    }

    fn classes_in_root(&self, root: &Path) -> Vec<Rc<TestClass>> {
        self.top_level
            .iter()
            .filter(|class| class.classpath_root().is_some_and(|r| r.starts_with(root)))
            .cloned()
            .collect()
    }
}

/// `com.example` contains `com.example` and `com.example.sub`, but not `com.examples`.
fn package_contains(package: &str, candidate: &str) -> bool {
    if package.is_empty() {
        return true;
    }
    candidate == package
        || candidate
            .strip_prefix(package)
            .is_some_and(|rest| rest.starts_with('.'))
}
