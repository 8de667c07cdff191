//! The discovery tree.
//!
//! A [`TestTree`] is an arena of [`TestDescriptor`]s linked by parent indices. The root is an engine
//! descriptor; below it sit containers (classes) and tests (methods). Every descriptor carries an
//! engine-specific node payload `N` that tells the engine how to execute it.
//!
//! ## Lifecycle
//!
//! Created during resolution, mutated (children added, filtered, pruned) until execution starts, then
//! read-only except for dynamic tests appended by test factories.

mod filter;
mod tree;

pub use filter::{FilterSubject, PostDiscoveryFilter};
pub use tree::{NodeId, TestTree};

use std::fmt;

use trellis_core::UniqueId;

/// Where a descriptor came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSource {
    Class { class_name: String },
    Method { class_name: String, signature: String },
    Dynamic { factory: String, index: usize },
}

impl fmt::Display for TestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestSource::Class { class_name } => write!(f, "{class_name}"),
            TestSource::Method { class_name, signature } => write!(f, "{class_name}#{signature}"),
            TestSource::Dynamic { factory, index } => write!(f, "{factory}[{index}]"),
        }
    }
}

/// Whether a descriptor is executed as a test, a container, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorType {
    Engine,
    Container,
    Test,
    ContainerAndTest,
}

impl DescriptorType {
    pub fn is_container(self) -> bool {
        matches!(self, Self::Engine | Self::Container | Self::ContainerAndTest)
    }

    pub fn is_test(self) -> bool {
        matches!(self, Self::Test | Self::ContainerAndTest)
    }
}

/// A node of the discovery tree, without its engine payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDescriptor {
    unique_id: UniqueId,
    display_name: String,
    descriptor_type: DescriptorType,
    tags: Vec<String>,
    source: Option<TestSource>,
}

impl TestDescriptor {
    pub fn new(unique_id: UniqueId, display_name: impl Into<String>, descriptor_type: DescriptorType) -> Self {
        Self {
            unique_id,
            display_name: display_name.into(),
            descriptor_type,
            tags: Vec::new(),
            source: None,
        }
    }

    pub fn engine(engine_id: &str) -> Self {
        Self::new(
            UniqueId::for_engine(engine_id),
            format!("Engine: {engine_id}"),
            DescriptorType::Engine,
        )
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_source(mut self, source: TestSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn descriptor_type(&self) -> DescriptorType {
        self.descriptor_type
    }

    pub fn is_container(&self) -> bool {
        self.descriptor_type.is_container()
    }

    pub fn is_test(&self) -> bool {
        self.descriptor_type.is_test()
    }

    pub fn is_engine(&self) -> bool {
        self.descriptor_type == DescriptorType::Engine
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn source(&self) -> Option<&TestSource> {
        self.source.as_ref()
    }
}
