use serde_json::json;
use soldeploy_cli::core::Resource;
use soldeploy_cli::deploy::{DeployContext, DeployOptions, DeploymentStatus, SkipReason, deploy_graph};
use soldeploy_cli::extractor::ExtractorRegistry;
use soldeploy_cli::template::{BuildOptions, TemplateGraph, build_graph};
use soldeploy_cli::test_utils::{MemoryPlatform, PlatformCall};
use soldeploy_cli::tokens::RunContext;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{self, id};

const CHAIN_TYPES: &[&str] = &["Feature Service", "Web Map", "Web Mapping Application", "Group"];

async fn package(source: &MemoryPlatform, roots: &[String]) -> TemplateGraph {
    build_graph(roots, source, &ExtractorRegistry::with_builtins(), &BuildOptions::default())
        .await
        .unwrap()
}

fn source_with(resources: Vec<Resource>) -> MemoryPlatform {
    resources.into_iter().fold(MemoryPlatform::new(), MemoryPlatform::with_resource)
}

fn context() -> DeployContext {
    DeployContext::new(RunContext {
        org_id: Some("destorg".to_string()),
        portal_base_url: Some(common::DEST_BASE_URL.to_string()),
        username: Some("publisher".to_string()),
    })
}

#[tokio::test]
async fn test_chain_rewires_references_to_new_ids() {
    let source = source_with(common::chain());
    let graph = package(&source, &[id('c')]).await;

    let dest = Arc::new(MemoryPlatform::new());
    let mut seen = Vec::new();
    let summary = deploy_graph(
        &graph,
        &dest.handlers(CHAIN_TYPES),
        dest.as_ref(),
        &context(),
        &DeployOptions::default(),
        &mut |p: u8| seen.push(p),
    )
    .await
    .unwrap();

    assert!(summary.is_complete_success());
    assert_eq!(dest.created_tokens(), vec![id('a'), id('b'), id('c')]);
    assert_eq!(seen.last(), Some(&100));

    let new_id = |token: &str| summary.dictionary.get(token).unwrap().new_id.clone();
    let service = dest.get(&new_id(&id('a'))).unwrap();
    assert_eq!(service.url(), Some(common::SERVICE_URL));

    let map = dest.get(&new_id(&id('b'))).unwrap();
    let layer = &map.json_data().unwrap()["operationalLayers"][0];
    assert_eq!(layer["itemId"], new_id(&id('a')).as_str());
    assert_eq!(layer["url"], format!("{}/0", common::SERVICE_URL));

    let app = dest.get(&new_id(&id('c'))).unwrap();
    assert_eq!(app.json_data().unwrap()["values"]["webmap"], new_id(&id('b')).as_str());
}

#[tokio::test]
async fn test_failed_creation_blocks_dependents() {
    let source = source_with(common::chain());
    let graph = package(&source, &[id('c')]).await;

    let dest = Arc::new(MemoryPlatform::new());
    dest.fail_create(id('b'), "map service unavailable");
    let mut seen = Vec::new();
    let summary = deploy_graph(
        &graph,
        &dest.handlers(CHAIN_TYPES),
        dest.as_ref(),
        &context(),
        &DeployOptions::default(),
        &mut |p: u8| seen.push(p),
    )
    .await
    .unwrap();

    assert!(summary.record(&id('a')).unwrap().is_succeeded());
    assert!(matches!(
        &summary.record(&id('b')).unwrap().status,
        DeploymentStatus::Failed { error } if error.contains("map service unavailable")
    ));
    assert_eq!(
        summary.record(&id('c')).unwrap().status,
        DeploymentStatus::Skipped {
            reason: SkipReason::BlockedBy { token: id('b') }
        }
    );
    assert_eq!(dest.created_tokens(), vec![id('a'), id('b')]);
    assert!(!summary.dictionary.contains(&id('c')));
    assert!(!summary.is_complete_success());
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_parallel_creations_respect_the_cap() {
    let services: Vec<Resource> = ['1', '2', '3', '4', '5', '6']
        .into_iter()
        .map(|c| Resource::new(id(c), "Feature Service").with_base(json!({"title": format!("Layer {c}")})))
        .collect();
    let roots: Vec<String> = services.iter().map(|r| r.id.clone()).collect();
    let source = source_with(services);
    let graph = package(&source, &roots).await;

    let dest = Arc::new(MemoryPlatform::new());
    for root in &roots {
        dest.delay_create(root.clone(), Duration::from_millis(30));
    }
    let options = DeployOptions {
        max_parallel: 2,
        ..DeployOptions::default()
    };
    let summary = deploy_graph(
        &graph,
        &dest.handlers(CHAIN_TYPES),
        dest.as_ref(),
        &context(),
        &options,
        &mut soldeploy_cli::utils::NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(summary.succeeded().len(), 6);
    assert_eq!(dest.peak_in_flight(), 2);
}

#[tokio::test]
async fn test_shares_into_new_and_existing_groups() {
    let group = Resource::new(id('d'), "Group").with_base(json!({"title": "Field Team"}));
    let existing_group = id('e');
    let map = common::map_b().in_group(id('d')).in_group(existing_group.clone());

    let source = source_with(vec![common::service_a(), map, group]);
    let graph = package(&source, &[id('b'), id('d')]).await;
    assert!(graph.is_external(&existing_group));
    assert!(graph.get(&id('b')).unwrap().dependency_tokens.contains(&id('d')));

    let dest = Arc::new(MemoryPlatform::new());
    let summary = deploy_graph(
        &graph,
        &dest.handlers(CHAIN_TYPES),
        dest.as_ref(),
        &context(),
        &DeployOptions::default(),
        &mut soldeploy_cli::utils::NoProgress,
    )
    .await
    .unwrap();

    assert!(summary.is_complete_success());
    let new_map = summary.dictionary.get(&id('b')).unwrap().new_id.clone();
    let new_group = summary.dictionary.get(&id('d')).unwrap().new_id.clone();

    let mut shares: Vec<(String, String)> = dest
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            PlatformCall::Share { resource_id, group_id, .. } => Some((resource_id, group_id)),
            _ => None,
        })
        .collect();
    shares.sort();
    let mut expected = vec![(new_map.clone(), new_group), (new_map, existing_group)];
    expected.sort();
    assert_eq!(shares, expected);
    assert!(summary.shares.iter().all(|share| share.error.is_none()));
}

#[tokio::test]
async fn test_share_failure_is_recorded_without_failing_creation() {
    let source = source_with(vec![common::service_a(), common::map_b().in_group(id('e'))]);
    let graph = package(&source, &[id('b')]).await;

    let dest = Arc::new(MemoryPlatform::new());
    dest.fail_share(id('e'), "group is full");
    let summary = deploy_graph(
        &graph,
        &dest.handlers(CHAIN_TYPES),
        dest.as_ref(),
        &context(),
        &DeployOptions::default(),
        &mut soldeploy_cli::utils::NoProgress,
    )
    .await
    .unwrap();

    assert!(summary.record(&id('b')).unwrap().is_succeeded());
    assert_eq!(summary.shares.len(), 1);
    assert_eq!(summary.shares[0].group_id.as_deref(), Some(id('e').as_str()));
    assert!(summary.shares[0].error.as_deref().is_some_and(|e| e.contains("group is full")));
}
