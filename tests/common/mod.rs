//! Shared fixtures for the integration suite.
#![allow(dead_code)]

use serde_json::json;
use soldeploy_cli::core::Resource;
use soldeploy_cli::portal::{LocalPortal, PortalSettings};
use std::path::Path;

pub const SOURCE_BASE_URL: &str = "https://source.example.com/portal";
pub const DEST_BASE_URL: &str = "https://dest.example.com/portal";
pub const SERVICE_URL: &str = "https://services.example.com/org/arcgis/rest/services/Assets/FeatureServer";

/// A 32-character item id made of `c`.
pub fn id(c: char) -> String {
    std::iter::repeat_n(c, 32).collect()
}

/// Token `A` of the standard chain: a feature service.
pub fn service_a() -> Resource {
    Resource::new(id('a'), "Feature Service").with_base(json!({
        "title": "Assets",
        "url": SERVICE_URL,
        "modified": 1_700_000_000_000_i64,
    }))
}

/// Token `B` of the standard chain: a web map over `A`.
pub fn map_b() -> Resource {
    Resource::new(id('b'), "Web Map")
        .with_base(json!({"title": "Asset Map"}))
        .with_json_data(json!({
            "operationalLayers": [
                {"id": "assets", "itemId": id('a'), "url": format!("{SERVICE_URL}/0")}
            ]
        }))
}

/// Token `C` of the standard chain: an app over `B`.
pub fn app_c() -> Resource {
    Resource::new(id('c'), "Web Mapping Application")
        .with_base(json!({"title": "Asset Viewer"}))
        .with_json_data(json!({"values": {"webmap": id('b')}}))
}

/// The chain C -> B -> A.
pub fn chain() -> Vec<Resource> {
    vec![service_a(), map_b(), app_c()]
}

/// Create a portal directory holding `resources`.
pub async fn seed_portal(root: &Path, base_url: &str, resources: &[Resource]) -> LocalPortal {
    let settings = PortalSettings {
        org_id: Some("destorg".to_string()),
        base_url: base_url.to_string(),
        username: Some("publisher".to_string()),
    };
    let portal = LocalPortal::init(root, settings).await.unwrap();
    for resource in resources {
        portal.put(resource).await.unwrap();
    }
    portal
}
