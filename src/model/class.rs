//! Test classes and their builder.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use trellis_core::{Fallible, Failure};

use super::{Annotated, DynamicTest, Instance, InstanceFactory, Marker, TestMethod, Value, downcast_instance};
use crate::extension::ExtensionDecl;

/// A test class: a named container of methods and nested classes.
///
/// `name` is fully qualified (`com.example.CalculatorTests`); nested classes conventionally use
/// `Outer$Inner` so they share the package of their enclosing class.
pub struct TestClass {
    name: String,
    markers: Vec<Marker>,
    extensions: Vec<ExtensionDecl>,
    methods: Vec<Rc<TestMethod>>,
    nested: Vec<Rc<TestClass>>,
    factory: Option<InstanceFactory>,
    root: Option<PathBuf>,
    is_static: bool,
    is_abstract: bool,
}

impl TestClass {
    pub fn builder(name: impl Into<String>) -> TestClassBuilder {
        TestClassBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without the package prefix.
    pub fn simple_name(&self) -> &str {
        let after_package = self.name.rsplit_once('.').map_or(self.name.as_str(), |(_, rest)| rest);
        after_package.rsplit_once('$').map_or(after_package, |(_, rest)| rest)
    }

    /// Everything before the last `.` of the name; empty for the default package.
    pub fn package(&self) -> &str {
        self.name.rsplit_once('.').map_or("", |(package, _)| package)
    }

    pub fn methods(&self) -> &[Rc<TestMethod>] {
        &self.methods
    }

    pub fn nested_classes(&self) -> &[Rc<TestClass>] {
        &self.nested
    }

    pub fn extensions(&self) -> &[ExtensionDecl] {
        &self.extensions
    }

    pub fn classpath_root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn find_method(&self, name: &str) -> Option<&Rc<TestMethod>> {
        self.methods.iter().find(|m| m.name() == name)
    }

    /// Create an instance; `outer` is the enclosing instance for nested classes.
    pub fn instantiate(&self, outer: Option<&Instance>) -> Fallible<Instance> {
        match &self.factory {
            Some(factory) => factory(outer),
            None => Err(Failure::configuration(format!(
                "class '{}' has no instance factory",
                self.name
            ))),
        }
    }
}

impl Annotated for TestClass {
    fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

impl fmt::Debug for TestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClass")
            .field("name", &self.name)
            .field("markers", &self.markers)
            .field("methods", &self.methods)
            .field("nested", &self.nested)
            .finish()
    }
}

/// Builder for [`TestClass`].
pub struct TestClassBuilder {
    class: TestClass,
}

impl TestClassBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            class: TestClass {
                name: name.into(),
                markers: Vec::new(),
                extensions: Vec::new(),
                methods: Vec::new(),
                nested: Vec::new(),
                factory: None,
                root: None,
                is_static: false,
                is_abstract: false,
            },
        }
    }

    /// Instances are created with `T::default()`.
    pub fn instance_default<T: Default + 'static>(self) -> Self {
        self.instance(T::default)
    }

    pub fn instance<T: 'static>(mut self, make: impl Fn() -> T + 'static) -> Self {
        self.class.factory = Some(Rc::new(move |_| Ok(Rc::new(make()) as Instance)));
        self
    }

    /// Instances of a nested class are built from the enclosing instance.
    pub fn instance_in<O: 'static, T: 'static>(mut self, make: impl Fn(&O) -> T + 'static) -> Self {
        let name = self.class.name.clone();
        self.class.factory = Some(Rc::new(move |outer| {
            let outer = downcast_instance::<O>(outer, &name)?;
            Ok(Rc::new(make(outer)) as Instance)
        }));
        self
    }

    pub fn instance_factory(mut self, factory: impl Fn(Option<&Instance>) -> Fallible<Instance> + 'static) -> Self {
        self.class.factory = Some(Rc::new(factory));
        self
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.class.markers.push(marker);
        self
    }

    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.marker(Marker::Tag(tag.into()))
    }

    pub fn display_name(self, name: impl Into<String>) -> Self {
        self.marker(Marker::DisplayName(name.into()))
    }

    pub fn disabled(self, reason: impl Into<String>) -> Self {
        self.marker(Marker::Disabled(reason.into()))
    }

    pub fn extend_with(mut self, extension: ExtensionDecl) -> Self {
        self.class.extensions.push(extension);
        self
    }

    pub fn classpath_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.class.root = Some(root.into());
        self
    }

    pub fn static_member(mut self) -> Self {
        self.class.is_static = true;
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.class.is_abstract = true;
        self
    }

    pub fn method(mut self, method: TestMethod) -> Self {
        self.class.methods.push(Rc::new(method));
        self
    }

    /// A `Test` method taking the typed instance.
    pub fn test<T: 'static>(self, name: impl Into<String>, body: impl Fn(&T) -> Fallible + 'static) -> Self {
        self.method(TestMethod::on::<T>(name, move |target, _| body(target)).marker(Marker::Test))
    }

    pub fn before_each<T: 'static>(self, name: impl Into<String>, body: impl Fn(&T) -> Fallible + 'static) -> Self {
        self.method(TestMethod::on::<T>(name, move |target, _| body(target)).marker(Marker::BeforeEach))
    }

    pub fn after_each<T: 'static>(self, name: impl Into<String>, body: impl Fn(&T) -> Fallible + 'static) -> Self {
        self.method(TestMethod::on::<T>(name, move |target, _| body(target)).marker(Marker::AfterEach))
    }

    pub fn before_all(self, name: impl Into<String>, body: impl Fn() -> Fallible + 'static) -> Self {
        self.method(TestMethod::static_fn(name, move |_| body()).marker(Marker::BeforeAll))
    }

    pub fn after_all(self, name: impl Into<String>, body: impl Fn() -> Fallible + 'static) -> Self {
        self.method(TestMethod::static_fn(name, move |_| body()).marker(Marker::AfterAll))
    }

    /// A `TestFactory` method producing dynamic tests.
    pub fn test_factory<T: 'static>(
        self,
        name: impl Into<String>,
        body: impl Fn(&T) -> Fallible<Vec<DynamicTest>> + 'static,
    ) -> Self {
        let name = name.into();
        let method_name = name.clone();
        let method = TestMethod::new(name, move |instance, _| {
            let target = downcast_instance::<T>(instance, &method_name)?;
            let tests = body(target)?;
            Ok(Some(Rc::new(tests) as Value))
        });
        self.method(method.marker(Marker::TestFactory))
    }

    /// Add a nested class. Nested test classes must carry [`Marker::Nested`] and must not be static.
    pub fn nested(mut self, class: TestClass) -> Self {
        self.class.nested.push(Rc::new(class));
        self
    }

    pub fn build(self) -> TestClass {
        self.class
    }
}
