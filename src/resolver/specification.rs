//! What to discover: selectors, filters and engine restrictions.

use std::fmt;
use std::path::PathBuf;

use trellis_core::{UniqueId, UniqueIdError};

use crate::descriptor::PostDiscoveryFilter;

/// One element of a specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// A class by qualified name, with all its tests and nested classes.
    Class(String),
    /// One method. Without `parameter_types`, the first test method with that name.
    Method {
        class_name: String,
        method_name: String,
        parameter_types: Option<Vec<String>>,
    },
    /// Every test class in a package and its sub-packages.
    Package(String),
    UniqueId(UniqueId),
    /// Every test class loaded from a classpath root.
    ClasspathRoot(PathBuf),
}

impl Selector {
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    pub fn method(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self::Method {
            class_name: class_name.into(),
            method_name: method_name.into(),
            parameter_types: None,
        }
    }

    pub fn package(name: impl Into<String>) -> Self {
        Self::Package(name.into())
    }

    pub fn unique_id(text: &str) -> Result<Self, UniqueIdError> {
        UniqueId::parse(text).map(Self::UniqueId)
    }

    pub fn classpath_root(root: impl Into<PathBuf>) -> Self {
        Self::ClasspathRoot(root.into())
    }

    /// Parse `Class#method` or `Class#method(T1, T2)`. Returns `None` without a `#`.
    pub fn parse_method(text: &str) -> Option<Self> {
        let (class_name, method) = text.split_once('#')?;
        if class_name.is_empty() || method.is_empty() {
            return None;
        }
        let (method_name, parameter_types) = match method.split_once('(') {
            Some((name, rest)) => {
                let types = rest.strip_suffix(')')?;
                (name, Some(split_parameter_types(types)))
            }
            None => (method, None),
        };
        Some(Self::Method {
            class_name: class_name.to_string(),
            method_name: method_name.to_string(),
            parameter_types,
        })
    }
}

/// Split a parameter list on the commas that are not nested inside `<>`, `()` or `[]`.
fn split_parameter_types(list: &str) -> Vec<String> {
    let mut types = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in list.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                types.push(&list[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    types.push(&list[start..]);
    types
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(name) => write!(f, "class:{name}"),
            Self::Method {
                class_name,
                method_name,
                parameter_types,
            } => match parameter_types {
                Some(types) => write!(f, "method:{class_name}#{method_name}({})", types.join(", ")),
                None => write!(f, "method:{class_name}#{method_name}"),
            },
            Self::Package(name) => write!(f, "package:{name}"),
            Self::UniqueId(id) => write!(f, "uid:{id}"),
            Self::ClasspathRoot(root) => write!(f, "root:{}", root.display()),
        }
    }
}

/// Selectors, post-discovery filters and engine restrictions for one discovery.
#[derive(Debug, Clone, Default)]
pub struct TestPlanSpecification {
    selectors: Vec<Selector>,
    filters: Vec<PostDiscoveryFilter>,
    engine_ids: Vec<String>,
}

impl TestPlanSpecification {
    pub fn builder() -> TestPlanSpecificationBuilder {
        TestPlanSpecificationBuilder::default()
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn filters(&self) -> &[PostDiscoveryFilter] {
        &self.filters
    }

    /// Engines allowed to take part; empty means all.
    pub fn engine_ids(&self) -> &[String] {
        &self.engine_ids
    }

    pub fn accepts_engine(&self, id: &str) -> bool {
        self.engine_ids.is_empty() || self.engine_ids.iter().any(|e| e == id)
    }
}

#[derive(Debug, Default)]
pub struct TestPlanSpecificationBuilder {
    specification: TestPlanSpecification,
}

impl TestPlanSpecificationBuilder {
    pub fn select(mut self, selector: Selector) -> Self {
        self.specification.selectors.push(selector);
        self
    }

    pub fn select_all(mut self, selectors: impl IntoIterator<Item = Selector>) -> Self {
        self.specification.selectors.extend(selectors);
        self
    }

    pub fn filter(mut self, filter: PostDiscoveryFilter) -> Self {
        self.specification.filters.push(filter);
        self
    }

    pub fn engine(mut self, id: impl Into<String>) -> Self {
        self.specification.engine_ids.push(id.into());
        self
    }

    pub fn build(self) -> TestPlanSpecification {
        self.specification
    }
}
