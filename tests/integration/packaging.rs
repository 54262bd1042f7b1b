use soldeploy_cli::core::SolutionError;
use soldeploy_cli::extractor::ExtractorRegistry;
use soldeploy_cli::resolver::{hierarchy, sort};
use soldeploy_cli::template::{BuildOptions, SolutionBundle, build_graph};
use soldeploy_cli::test_utils::MemoryPlatform;
use tempfile::TempDir;

use crate::common::{self, id};

fn source() -> MemoryPlatform {
    common::chain().into_iter().fold(MemoryPlatform::new(), MemoryPlatform::with_resource)
}

fn item_placeholder(token: &str) -> String {
    format!("{{{{{token}.itemId}}}}")
}

#[tokio::test]
async fn test_chain_is_templatized_end_to_end() {
    let graph = build_graph(&[id('c')], &source(), &ExtractorRegistry::with_builtins(), &BuildOptions::default())
        .await
        .unwrap();
    assert_eq!(graph.len(), 3);

    let map = graph.get(&id('b')).unwrap();
    assert_eq!(map.dependency_tokens, vec![id('a')]);
    let layer = match &map.data_doc {
        Some(soldeploy_cli::core::ResourceData::Json(doc)) => doc["operationalLayers"][0].clone(),
        other => panic!("unexpected data {other:?}"),
    };
    assert_eq!(layer["itemId"], item_placeholder(&id('a')));
    assert_eq!(layer["url"], format!("{{{{{}.url}}}}/0", id('a')));

    let app = graph.get(&id('c')).unwrap();
    assert_eq!(app.dependency_tokens, vec![id('b')]);

    let order = sort(&graph).unwrap();
    assert_eq!(order.tokens(), &[id('a'), id('b'), id('c')]);

    let roots = hierarchy(&graph);
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].token, id('c'));
    assert_eq!(roots[0].children[0].children[0].token, id('a'));
}

#[tokio::test]
async fn test_shared_dependency_is_packaged_once() {
    let graph = build_graph(
        &[id('c'), id('a'), format!("{}_0", id('b'))],
        &source(),
        &ExtractorRegistry::with_builtins(),
        &BuildOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(graph.len(), 3);
    assert_eq!(sort(&graph).unwrap().len(), 3);
}

#[tokio::test]
async fn test_unreadable_dependency_can_be_left_external() {
    let platform = source();
    platform.deny_read(id('a'));
    let registry = ExtractorRegistry::with_builtins();

    let err = build_graph(&[id('c')], &platform, &registry, &BuildOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SolutionError::ResourceInaccessible { .. }));

    let options = BuildOptions {
        skip_inaccessible: true,
        ..BuildOptions::default()
    };
    let graph = build_graph(&[id('c')], &platform, &registry, &options).await.unwrap();
    assert_eq!(graph.len(), 2);
    assert!(graph.is_external(&id('a')));

    let map = graph.get(&id('b')).unwrap();
    let data = serde_json::to_string(&map.data_doc).unwrap();
    assert!(data.contains(&id('a')));
    assert!(!data.contains(&item_placeholder(&id('a'))));
}

#[tokio::test]
async fn test_missing_root_fails_the_build() {
    let err = build_graph(&[id('9')], &source(), &ExtractorRegistry::with_builtins(), &BuildOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SolutionError::ResourceNotFound { .. }));
}

#[tokio::test]
async fn test_bundle_survives_save_and_load() {
    let graph = build_graph(&[id('c')], &source(), &ExtractorRegistry::with_builtins(), &BuildOptions::default())
        .await
        .unwrap();
    let mut bundle = SolutionBundle::new(graph, Some(common::SOURCE_BASE_URL.to_string()));
    bundle.metadata.thumbnail_resource_id = Some(id('c'));

    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("solution.json");
    bundle.save(&path).await.unwrap();

    let loaded = SolutionBundle::load(&path).await.unwrap();
    assert_eq!(loaded, bundle);
}

#[tokio::test]
async fn test_bundle_from_a_future_schema_is_rejected() {
    let graph = build_graph(&[id('a')], &source(), &ExtractorRegistry::with_builtins(), &BuildOptions::default())
        .await
        .unwrap();
    let mut json: serde_json::Value = serde_json::from_str(&SolutionBundle::new(graph, None).to_json().unwrap()).unwrap();
    json["metadata"]["schemaVersion"] = "2.0.0".into();

    let err = SolutionBundle::from_json(&json.to_string(), "solution.json").unwrap_err();
    assert!(matches!(err, SolutionError::IncompatibleSchema { .. }));
}
