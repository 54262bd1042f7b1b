//! Built-in extractors for the common item types.

use serde_json::Value;

use super::layout::extract_layout_dependencies;
use super::{DependencyExtractor, push_str_id, push_unique};
use crate::constants::DEFAULT_COST_WEIGHT;
use crate::core::{ExtendedId, Resource};

/// Extractor for types that never reference other items.
#[derive(Debug, Clone, Copy)]
pub struct NoDependencies {
    cost: u32,
}

impl NoDependencies {
    /// No dependencies, with a custom cost weight.
    #[must_use]
    pub const fn with_cost(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for NoDependencies {
    fn default() -> Self {
        Self::with_cost(DEFAULT_COST_WEIGHT)
    }
}

impl DependencyExtractor for NoDependencies {
    fn extract(&self, _resource: &Resource) -> Vec<ExtendedId> {
        Vec::new()
    }

    fn cost_weight(&self) -> u32 {
        self.cost
    }
}

/// Layer index at the end of a service url such as `.../FeatureServer/3`.
fn trailing_layer_index(url: &str) -> Option<&str> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    (!last.is_empty() && last.chars().all(|c| c.is_ascii_digit())).then_some(last)
}

fn push_layer(ids: &mut Vec<ExtendedId>, layer: &Value) {
    if let Some(item_id) = layer.get("itemId").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        let selector = layer
            .get("layerId")
            .and_then(Value::as_u64)
            .map(|n| n.to_string())
            .or_else(|| {
                layer
                    .get("url")
                    .and_then(Value::as_str)
                    .and_then(trailing_layer_index)
                    .map(str::to_string)
            });
        let id = match selector {
            Some(selector) => ExtendedId::with_selector(item_id, selector),
            None => ExtendedId::new(item_id),
        };
        push_unique(ids, id);
    }

    // group layers nest their children
    if let Some(children) = layer.get("layers").and_then(Value::as_array) {
        for child in children {
            push_layer(ids, child);
        }
    }
}

/// `Web Map`: operational layers (recursively), tables, and basemap layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMapExtractor;

impl DependencyExtractor for WebMapExtractor {
    fn extract(&self, resource: &Resource) -> Vec<ExtendedId> {
        let mut ids = Vec::new();
        let Some(data) = resource.json_data() else {
            return ids;
        };

        for key in ["operationalLayers", "tables"] {
            for layer in data.get(key).and_then(Value::as_array).into_iter().flatten() {
                push_layer(&mut ids, layer);
            }
        }
        let basemap_layers = data.pointer("/baseMap/baseMapLayers").and_then(Value::as_array);
        for layer in basemap_layers.into_iter().flatten() {
            push_layer(&mut ids, layer);
        }
        ids
    }
}

/// `Web Mapping Application`: configured web map and group.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMappingAppExtractor;

impl DependencyExtractor for WebMappingAppExtractor {
    fn extract(&self, resource: &Resource) -> Vec<ExtendedId> {
        let mut ids = Vec::new();
        if let Some(data) = resource.json_data() {
            push_str_id(&mut ids, data.pointer("/values/webmap"));
            push_str_id(&mut ids, data.pointer("/map/itemId"));
            push_str_id(&mut ids, data.pointer("/values/group"));
        }
        ids
    }
}

/// `Dashboard`: map widgets and widget data sources in both view layouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardExtractor;

impl DashboardExtractor {
    fn push_widgets(ids: &mut Vec<ExtendedId>, widgets: Option<&Value>) {
        for widget in widgets.and_then(Value::as_array).into_iter().flatten() {
            push_str_id(ids, widget.get("itemId"));
            for dataset in widget.get("datasets").and_then(Value::as_array).into_iter().flatten() {
                push_str_id(ids, dataset.pointer("/dataSource/itemId"));
            }
        }
    }
}

impl DependencyExtractor for DashboardExtractor {
    fn extract(&self, resource: &Resource) -> Vec<ExtendedId> {
        let mut ids = Vec::new();
        if let Some(data) = resource.json_data() {
            Self::push_widgets(&mut ids, data.get("widgets"));
            Self::push_widgets(&mut ids, data.pointer("/desktopView/widgets"));
            Self::push_widgets(&mut ids, data.pointer("/mobileView/widgets"));
        }
        ids
    }
}

/// `Hub Site Application` and `Hub Page`: cards in `values.layout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HubLayoutExtractor;

impl DependencyExtractor for HubLayoutExtractor {
    fn extract(&self, resource: &Resource) -> Vec<ExtendedId> {
        resource
            .json_data()
            .and_then(|data| data.pointer("/values/layout"))
            .map(extract_layout_dependencies)
            .unwrap_or_default()
    }
}

/// `Workforce Project`: the feature services backing each project role.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkforceProjectExtractor;

impl DependencyExtractor for WorkforceProjectExtractor {
    fn extract(&self, resource: &Resource) -> Vec<ExtendedId> {
        let mut ids = Vec::new();
        if let Some(data) = resource.json_data() {
            for role in ["dispatchers", "assignments", "workers", "tracks"] {
                push_str_id(&mut ids, data.get(role).and_then(|r| r.get("serviceItemId")));
            }
        }
        ids
    }
}
