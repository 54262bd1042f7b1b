//! Dependency extraction registry.
//!
//! Every resource type that can reference other items gets an extractor that
//! reads its payload and reports the ids it depends on. Extractors are pure:
//! they see only the [`Resource`] and never call out to the platform, so each
//! can be tested against a bare payload fragment.
//!
//! A type without an extractor contributes no dependencies. That is logged,
//! not treated as an error, so new item types degrade to "copied without
//! rewiring" instead of aborting a packaging run.

mod builtin;
pub mod layout;

pub use builtin::{
    DashboardExtractor, HubLayoutExtractor, NoDependencies, WebMapExtractor,
    WebMappingAppExtractor, WorkforceProjectExtractor,
};

use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::DEFAULT_COST_WEIGHT;
use crate::core::{ExtendedId, Resource, ResourceType};

/// Extracts dependency ids from one resource type's payload.
pub trait DependencyExtractor: Send + Sync {
    /// Ids this resource depends on, in encounter order.
    fn extract(&self, resource: &Resource) -> Vec<ExtendedId>;

    /// Relative creation effort for progress weighting.
    fn cost_weight(&self) -> u32 {
        DEFAULT_COST_WEIGHT
    }
}

impl<F> DependencyExtractor for F
where
    F: Fn(&Resource) -> Vec<ExtendedId> + Send + Sync,
{
    fn extract(&self, resource: &Resource) -> Vec<ExtendedId> {
        self(resource)
    }
}

/// Append `id` unless it is empty or already present.
pub(crate) fn push_unique(ids: &mut Vec<ExtendedId>, id: ExtendedId) {
    if !id.base().is_empty() && !ids.contains(&id) {
        ids.push(id);
    }
}

/// Append a string id found at `value`, if it is a non-empty string.
pub(crate) fn push_str_id(ids: &mut Vec<ExtendedId>, value: Option<&serde_json::Value>) {
    if let Some(raw) = value.and_then(serde_json::Value::as_str) {
        push_unique(ids, ExtendedId::parse(raw.trim()));
    }
}

/// Registry from resource type to extractor.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<ResourceType, Arc<dyn DependencyExtractor>>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.extractors.keys().map(ResourceType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ExtractorRegistry").field("types", &types).finish()
    }
}

impl ExtractorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in extractors registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("Web Map", WebMapExtractor);
        registry.register("Web Mapping Application", WebMappingAppExtractor);
        registry.register("Dashboard", DashboardExtractor);
        registry.register("Hub Site Application", HubLayoutExtractor);
        registry.register("Hub Page", HubLayoutExtractor);
        registry.register("Workforce Project", WorkforceProjectExtractor);
        registry.register("Feature Service", NoDependencies::with_cost(10));
        registry.register("Form", NoDependencies::default());
        registry.register("Group", NoDependencies::default());
        registry
    }

    /// Register (or replace) the extractor for `resource_type`.
    pub fn register(
        &mut self,
        resource_type: impl Into<ResourceType>,
        extractor: impl DependencyExtractor + 'static,
    ) {
        self.extractors.insert(resource_type.into(), Arc::new(extractor));
    }

    /// The extractor for `resource_type`.
    #[must_use]
    pub fn get(&self, resource_type: &ResourceType) -> Option<&Arc<dyn DependencyExtractor>> {
        self.extractors.get(resource_type)
    }

    /// Whether an extractor is registered for `resource_type`.
    #[must_use]
    pub fn contains(&self, resource_type: &ResourceType) -> bool {
        self.extractors.contains_key(resource_type)
    }

    /// Registered types, sorted by name.
    #[must_use]
    pub fn types(&self) -> Vec<ResourceType> {
        let mut types: Vec<ResourceType> = self.extractors.keys().cloned().collect();
        types.sort_by_key(ResourceType::key);
        types
    }

    /// Dependencies of `resource`, deduplicated in encounter order.
    #[must_use]
    pub fn extract(&self, resource: &Resource) -> Vec<ExtendedId> {
        let Some(extractor) = self.get(&resource.resource_type) else {
            tracing::debug!(
                "No dependency extractor for type '{}' ({}); assuming no dependencies",
                resource.resource_type,
                resource.id
            );
            return Vec::new();
        };

        let mut ids = Vec::new();
        for id in extractor.extract(resource) {
            push_unique(&mut ids, id);
        }
        ids
    }

    /// Cost weight for `resource_type`, at least 1.
    #[must_use]
    pub fn cost_weight(&self, resource_type: &ResourceType) -> u32 {
        self.get(resource_type).map_or(DEFAULT_COST_WEIGHT, |e| e.cost_weight()).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_type_has_no_dependencies() {
        let registry = ExtractorRegistry::with_builtins();
        let resource = Resource::new("x", "Notebook").with_json_data(json!({"webmap": "y"}));
        assert!(registry.extract(&resource).is_empty());
        assert_eq!(registry.cost_weight(&resource.resource_type), DEFAULT_COST_WEIGHT);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ExtractorRegistry::with_builtins();
        assert!(registry.contains(&ResourceType::new("web mapping application")));
        assert_eq!(registry.cost_weight(&ResourceType::new("FEATURE SERVICE")), 10);
    }

    #[test]
    fn test_closure_extractor_results_are_deduplicated() {
        let mut registry = ExtractorRegistry::new();
        registry.register("Custom", |_: &Resource| {
            vec![ExtendedId::new("a"), ExtendedId::new("b"), ExtendedId::new("a"), ExtendedId::new("")]
        });
        let ids = registry.extract(&Resource::new("x", "custom"));
        assert_eq!(ids, vec![ExtendedId::new("a"), ExtendedId::new("b")]);
    }
}
