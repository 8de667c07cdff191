//! Run configuration shared by the CLI harness and the console reporter.
//!
//! A [`RunConfig`] carries everything that shapes a run besides the selectors themselves: discovery
//! filters, engine restrictions and how results are printed.

use crate::descriptor::PostDiscoveryFilter;
use crate::resolver::TestPlanSpecificationBuilder;

/// How the console reporter lays out results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Details {
    /// One character per test, or one line per test when verbose
    #[default]
    Flat,
    /// The container hierarchy, one node per line
    Tree,
}

/// Run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Print one line per test instead of one character
    pub verbose: bool,
    /// Emit ANSI colors
    pub color: bool,
    /// Print the elapsed time in the summary line
    pub durations: bool,
    pub details: Details,
    /// Keep only tests carrying one of these tags (own or inherited)
    pub include_tags: Vec<String>,
    /// Drop tests carrying any of these tags (own or inherited)
    pub exclude_tags: Vec<String>,
    /// Keep only tests whose display name or unique id contains this text
    pub keyword: Option<String>,
    /// Restrict the run to these engines; empty means all registered engines
    pub engine_ids: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            color: true,
            durations: true,
            details: Details::Flat,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            keyword: None,
            engine_ids: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_durations(mut self, durations: bool) -> Self {
        self.durations = durations;
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    pub fn include_tag(mut self, tag: impl Into<String>) -> Self {
        self.include_tags.push(tag.into());
        self
    }

    pub fn exclude_tag(mut self, tag: impl Into<String>) -> Self {
        self.exclude_tags.push(tag.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn engine(mut self, id: impl Into<String>) -> Self {
        self.engine_ids.push(id.into());
        self
    }

    /// The post-discovery filters this configuration implies, in a fixed order.
    pub fn filters(&self) -> Vec<PostDiscoveryFilter> {
        let mut filters = Vec::new();
        if !self.include_tags.is_empty() {
            filters.push(PostDiscoveryFilter::IncludeTags(self.include_tags.clone()));
        }
        if !self.exclude_tags.is_empty() {
            filters.push(PostDiscoveryFilter::ExcludeTags(self.exclude_tags.clone()));
        }
        if let Some(keyword) = &self.keyword {
            filters.push(PostDiscoveryFilter::NameContains(keyword.clone()));
        }
        filters
    }

    /// Add this configuration's filters and engine restrictions to a specification under construction.
    pub fn apply(&self, mut builder: TestPlanSpecificationBuilder) -> TestPlanSpecificationBuilder {
        for filter in self.filters() {
            builder = builder.filter(filter);
        }
        for id in &self.engine_ids {
            builder = builder.engine(id.clone());
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Selector, TestPlanSpecification};

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert!(!config.verbose);
        assert!(config.color);
        assert_eq!(config.details, Details::Flat);
        assert!(config.filters().is_empty());
    }

    #[test]
    fn test_apply_adds_filters_and_engines() {
        let config = RunConfig::new()
            .include_tag("fast")
            .exclude_tag("slow")
            .with_keyword("adds")
            .engine("trellis");
        let specification = config
            .apply(TestPlanSpecification::builder().select(Selector::package("")))
            .build();
        assert_eq!(specification.filters().len(), 3);
        assert!(matches!(specification.filters()[0], PostDiscoveryFilter::IncludeTags(_)));
        assert!(matches!(specification.filters()[2], PostDiscoveryFilter::NameContains(ref k) if k == "adds"));
        assert!(specification.accepts_engine("trellis"));
        assert!(!specification.accepts_engine("other"));
    }
}
