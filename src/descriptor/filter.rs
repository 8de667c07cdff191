//! Post-discovery filters.

use std::fmt;
use std::rc::Rc;

use super::TestDescriptor;

/// What a filter sees of a descriptor.
#[derive(Debug, Clone)]
pub struct FilterSubject<'a> {
    pub descriptor: &'a TestDescriptor,
    /// Qualified name of the nearest class on the ancestor chain, if any.
    pub class_name: Option<&'a str>,
    /// Own tags plus every ancestor's tags.
    pub effective_tags: Vec<String>,
}

/// A predicate applied to tests after resolution. Tests that fail any filter are pruned.
#[derive(Clone)]
pub enum PostDiscoveryFilter {
    ClassName(Rc<dyn Fn(&str) -> bool>),
    /// Keep tests whose display name or unique id contains the keyword.
    NameContains(String),
    /// Keep tests carrying at least one of the tags.
    IncludeTags(Vec<String>),
    /// Drop tests carrying any of the tags.
    ExcludeTags(Vec<String>),
    Custom {
        name: String,
        predicate: Rc<dyn Fn(&FilterSubject<'_>) -> bool>,
    },
}

impl PostDiscoveryFilter {
    pub fn class_name(predicate: impl Fn(&str) -> bool + 'static) -> Self {
        Self::ClassName(Rc::new(predicate))
    }

    pub fn custom(name: impl Into<String>, predicate: impl Fn(&FilterSubject<'_>) -> bool + 'static) -> Self {
        Self::Custom {
            name: name.into(),
            predicate: Rc::new(predicate),
        }
    }

    pub fn accepts(&self, subject: &FilterSubject<'_>) -> bool {
        match self {
            Self::ClassName(predicate) => subject.class_name.is_none_or(|name| predicate(name)),
            Self::NameContains(keyword) => {
                subject.descriptor.display_name().contains(keyword.as_str())
                    || subject.descriptor.unique_id().to_string().contains(keyword.as_str())
            }
            Self::IncludeTags(tags) => subject.effective_tags.iter().any(|tag| tags.contains(tag)),
            Self::ExcludeTags(tags) => !subject.effective_tags.iter().any(|tag| tags.contains(tag)),
            Self::Custom { predicate, .. } => predicate(subject),
        }
    }
}

impl fmt::Debug for PostDiscoveryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassName(_) => f.write_str("ClassName(..)"),
            Self::NameContains(keyword) => f.debug_tuple("NameContains").field(keyword).finish(),
            Self::IncludeTags(tags) => f.debug_tuple("IncludeTags").field(tags).finish(),
            Self::ExcludeTags(tags) => f.debug_tuple("ExcludeTags").field(tags).finish(),
            Self::Custom { name, .. } => f.debug_tuple("Custom").field(name).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorType;
    use trellis_core::UniqueId;

    fn subject<'a>(descriptor: &'a TestDescriptor, tags: &[&str]) -> FilterSubject<'a> {
        FilterSubject {
            descriptor,
            class_name: Some("com.example.CalculatorTests"),
            effective_tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_tag_filters() {
        let descriptor = TestDescriptor::new(
            UniqueId::parse("trellis:com.example.CalculatorTests/adds()").unwrap(),
            "adds()",
            DescriptorType::Test,
        );
        let tagged = subject(&descriptor, &["fast", "math"]);
        assert!(PostDiscoveryFilter::IncludeTags(vec!["math".into()]).accepts(&tagged));
        assert!(!PostDiscoveryFilter::IncludeTags(vec!["slow".into()]).accepts(&tagged));
        assert!(!PostDiscoveryFilter::ExcludeTags(vec!["fast".into()]).accepts(&tagged));
        assert!(!PostDiscoveryFilter::IncludeTags(vec!["math".into()]).accepts(&subject(&descriptor, &[])));
    }

    #[test]
    fn test_keyword_matches_display_name_or_unique_id() {
        let descriptor = TestDescriptor::new(
            UniqueId::parse("trellis:com.example.CalculatorTests/adds()").unwrap(),
            "Adding works",
            DescriptorType::Test,
        );
        let s = subject(&descriptor, &[]);
        assert!(PostDiscoveryFilter::NameContains("Adding".into()).accepts(&s));
        assert!(PostDiscoveryFilter::NameContains("adds(".into()).accepts(&s));
        assert!(!PostDiscoveryFilter::NameContains("divides".into()).accepts(&s));
    }

    #[test]
    fn test_class_name_and_custom() {
        let descriptor = TestDescriptor::new(UniqueId::for_engine("trellis").append("x"), "x", DescriptorType::Test);
        let s = subject(&descriptor, &[]);
        assert!(PostDiscoveryFilter::class_name(|name| name.ends_with("Tests")).accepts(&s));
        assert!(!PostDiscoveryFilter::custom("never", |_| false).accepts(&s));
    }
}
