//! Test methods, their parameters and dynamic tests.

use std::fmt;
use std::rc::Rc;

use trellis_core::Fallible;

use super::{Annotated, Callable, Instance, Marker, Value, downcast_instance};
use crate::extension::ExtensionDecl;

/// A declared method parameter. Resolution is driven by `type_name` and markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
    pub markers: Vec<Marker>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            markers: Vec::new(),
        }
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }
}

impl Annotated for Parameter {
    fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.type_name)
    }
}

/// A method declared on a test class.
#[derive(Clone)]
pub struct TestMethod {
    name: String,
    parameters: Vec<Parameter>,
    markers: Vec<Marker>,
    extensions: Vec<ExtensionDecl>,
    is_static: bool,
    body: Callable,
}

impl TestMethod {
    /// Create a method from a raw callable.
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(Option<&Instance>, &[Value]) -> Fallible<Option<Value>> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            markers: Vec::new(),
            extensions: Vec::new(),
            is_static: false,
            body: Rc::new(body),
        }
    }

    /// Create an instance method whose body receives the typed class instance and resolved arguments.
    pub fn on<T: 'static>(
        name: impl Into<String>,
        body: impl Fn(&T, &[Value]) -> Fallible + 'static,
    ) -> Self {
        let name = name.into();
        let method_name = name.clone();
        Self::new(name, move |instance, args| {
            let target = downcast_instance::<T>(instance, &method_name)?;
            body(target, args).map(|()| None)
        })
    }

    /// Create a static method (no instance).
    pub fn static_fn(name: impl Into<String>, body: impl Fn(&[Value]) -> Fallible + 'static) -> Self {
        Self::new(name, move |_, args| body(args).map(|()| None)).static_method()
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
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
        self.extensions.push(extension);
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn extensions(&self) -> &[ExtensionDecl] {
        &self.extensions
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn body(&self) -> &Callable {
        &self.body
    }

    /// Canonical signature used as the unique-id segment, e.g. `adds(i32, i32)`.
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.parameters.iter().map(|p| p.type_name.as_str()).collect();
        format!("{}({})", self.name, types.join(", "))
    }
}

impl Annotated for TestMethod {
    fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

impl fmt::Debug for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestMethod")
            .field("signature", &self.signature())
            .field("markers", &self.markers)
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// A test produced at execution time by a test factory method.
#[derive(Clone)]
pub struct DynamicTest {
    display_name: String,
    body: Rc<dyn Fn() -> Fallible>,
}

impl DynamicTest {
    pub fn new(display_name: impl Into<String>, body: impl Fn() -> Fallible + 'static) -> Self {
        Self {
            display_name: display_name.into(),
            body: Rc::new(body),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn run(&self) -> Fallible {
        (self.body)()
    }
}

impl fmt::Debug for DynamicTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicTest").field("display_name", &self.display_name).finish()
    }
}
