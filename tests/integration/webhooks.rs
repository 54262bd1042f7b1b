use serde_json::{Value, json};
use soldeploy_cli::archive::Archive;
use soldeploy_cli::core::{Resource, ResourceData};
use soldeploy_cli::deploy::{DeployContext, DeployOptions, deploy_graph};
use soldeploy_cli::extractor::ExtractorRegistry;
use soldeploy_cli::template::{BuildOptions, build_graph};
use soldeploy_cli::test_utils::MemoryPlatform;
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{self, id};

const AUTOMATION_HOOK: &str = "https://workflow.arcgis.com/srcorg/flows/3f2a/webhook";
const UNRELATED_HOOK: &str = "https://hooks.example.org/notify?channel=field";
const FORM_XML: &str = "<h:html><h:title>Inspection</h:title></h:html>";

fn portal_hook() -> String {
    format!("{}/sharing/rest/hooks/submit", common::SOURCE_BASE_URL)
}

fn form() -> Resource {
    let info = json!({
        "displayName": "Inspection",
        "notificationsInfo": {
            "webhooks": [
                {"name": "flow", "url": AUTOMATION_HOOK, "active": true},
                {"name": "portal", "url": portal_hook(), "active": true},
                {"name": "chat", "url": UNRELATED_HOOK, "active": false}
            ]
        }
    });
    let bytes = Archive::new()
        .with_text("esriinfo/form.info", info.to_string())
        .with_text("esriinfo/form.xml", FORM_XML)
        .to_bytes()
        .unwrap();

    let mut resource = Resource::new(id('f'), "Form").with_base(json!({"title": "Inspection"}));
    resource.data = Some(ResourceData::Archive(bytes));
    resource
}

fn hook_urls(archive_bytes: &[u8]) -> Vec<String> {
    let archive = Archive::from_bytes(archive_bytes).unwrap();
    let info: Value = serde_json::from_str(archive.entry("esriinfo/form.info").unwrap().text().unwrap()).unwrap();
    info["notificationsInfo"]["webhooks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|hook| hook["url"].as_str().unwrap().to_string())
        .collect()
}

fn archive_bytes(data: Option<&ResourceData>) -> &[u8] {
    match data {
        Some(ResourceData::Archive(bytes)) => bytes,
        other => panic!("expected archive data, got {other:?}"),
    }
}

fn options() -> BuildOptions {
    BuildOptions {
        source_base_url: Some(common::SOURCE_BASE_URL.to_string()),
        ..BuildOptions::default()
    }
}

#[tokio::test]
async fn test_packaging_templatizes_webhook_urls() {
    let source = MemoryPlatform::new().with_resource(form());
    let graph = build_graph(&[id('f')], &source, &ExtractorRegistry::with_builtins(), &options())
        .await
        .unwrap();

    let template = graph.get(&id('f')).unwrap();
    let urls = hook_urls(archive_bytes(template.data_doc.as_ref()));
    assert_eq!(
        urls,
        vec![
            "https://workflow.arcgis.com/{{user.orgId}}/flows/3f2a/webhook".to_string(),
            "{{portalBaseUrl}}/sharing/rest/hooks/submit".to_string(),
            UNRELATED_HOOK.to_string(),
        ]
    );

    let archive = Archive::from_bytes(archive_bytes(template.data_doc.as_ref())).unwrap();
    assert_eq!(archive.entry("esriinfo/form.xml").unwrap().text(), Some(FORM_XML));
}

#[tokio::test]
async fn test_deployed_form_points_at_destination() {
    let source = MemoryPlatform::new().with_resource(form());
    let graph = build_graph(&[id('f')], &source, &ExtractorRegistry::with_builtins(), &options())
        .await
        .unwrap();

    let temp = TempDir::new().unwrap();
    let portal = Arc::new(common::seed_portal(temp.path(), common::DEST_BASE_URL, &[]).await);
    let summary = deploy_graph(
        &graph,
        &portal.handlers(),
        portal.as_ref(),
        &DeployContext::new(portal.run_context()),
        &DeployOptions::default(),
        &mut soldeploy_cli::utils::NoProgress,
    )
    .await
    .unwrap();
    assert!(summary.is_complete_success());

    let new_id = &summary.dictionary.get(&id('f')).unwrap().new_id;
    let created = portal.read(new_id).await.unwrap();
    assert_eq!(
        hook_urls(archive_bytes(created.data.as_ref())),
        vec![
            "https://workflow.arcgis.com/destorg/flows/3f2a/webhook".to_string(),
            format!("{}/sharing/rest/hooks/submit", common::DEST_BASE_URL),
            UNRELATED_HOOK.to_string(),
        ]
    );
}

#[tokio::test]
async fn test_webhooks_without_source_base_url_only_touch_automation_hooks() {
    let source = MemoryPlatform::new().with_resource(form());
    let graph = build_graph(&[id('f')], &source, &ExtractorRegistry::with_builtins(), &BuildOptions::default())
        .await
        .unwrap();

    let urls = hook_urls(archive_bytes(graph.get(&id('f')).unwrap().data_doc.as_ref()));
    assert_eq!(urls[0], "https://workflow.arcgis.com/{{user.orgId}}/flows/3f2a/webhook");
    assert_eq!(urls[1], portal_hook());
    assert_eq!(urls[2], UNRELATED_HOOK);
}
