use serde_json::json;
use soldeploy_cli::core::Resource;
use soldeploy_cli::delete::{DeleteMode, DeleteOptions, DeletionStatus, delete_all};
use soldeploy_cli::deploy::{DeployContext, DeployOptions, DeploymentSummary, deploy_graph};
use soldeploy_cli::extractor::ExtractorRegistry;
use soldeploy_cli::handlers::HandlerRegistry;
use soldeploy_cli::resolver::sort;
use soldeploy_cli::template::{BuildOptions, TemplateGraph, build_graph};
use soldeploy_cli::test_utils::{MemoryPlatform, ScriptedConfirm};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{self, id};

const TYPES: &[&str] = &["Feature Service", "Web Map", "Web Mapping Application"];

struct Deployed {
    graph: TemplateGraph,
    dest: Arc<MemoryPlatform>,
    handlers: HandlerRegistry,
    summary: DeploymentSummary,
}

impl Deployed {
    fn new_id(&self, token: &str) -> String {
        self.summary.dictionary.get(token).unwrap().new_id.clone()
    }
}

async fn deployed_chain() -> Deployed {
    deployed(common::chain(), &[id('c')]).await
}

async fn deployed(resources: Vec<Resource>, roots: &[String]) -> Deployed {
    let source = resources.into_iter().fold(MemoryPlatform::new(), MemoryPlatform::with_resource);
    let graph = build_graph(roots, &source, &ExtractorRegistry::with_builtins(), &BuildOptions::default())
        .await
        .unwrap();

    let dest = Arc::new(MemoryPlatform::new());
    let handlers = dest.handlers(TYPES);
    let summary = deploy_graph(
        &graph,
        &handlers,
        dest.as_ref(),
        &DeployContext::default(),
        &DeployOptions::default(),
        &mut soldeploy_cli::utils::NoProgress,
    )
    .await
    .unwrap();
    assert!(summary.is_complete_success());

    Deployed {
        graph,
        dest,
        handlers,
        summary,
    }
}

#[tokio::test]
async fn test_checked_deletion_keeps_declined_resource() {
    let run = deployed_chain().await;
    let order = sort(&run.graph).unwrap();
    let gate = ScriptedConfirm::declining([id('b')]);

    let summary = delete_all(
        &run.graph,
        &order,
        &run.handlers,
        &run.summary.dictionary,
        DeleteMode::Checked(&gate),
        &DeleteOptions::default(),
    )
    .await;

    assert_eq!(gate.asked(), vec![id('c'), id('b'), id('a')]);
    assert!(summary.is_deleted(&id('c')));
    assert!(summary.is_deleted(&id('a')));
    assert!(!summary.is_deleted(&id('b')));

    let kept = summary.not_deleted.iter().find(|r| r.token == id('b')).unwrap();
    assert_eq!(kept.status, DeletionStatus::Declined);
    assert_eq!(kept.summary.title.as_deref(), Some("Asset Map"));

    assert!(run.dest.contains(&run.new_id(&id('b'))));
    assert!(!run.dest.contains(&run.new_id(&id('a'))));
    assert_eq!(run.dest.deleted_ids(), vec![run.new_id(&id('c')), run.new_id(&id('a'))]);
}

#[tokio::test]
async fn test_unchecked_deletion_attempts_everything_despite_failure() {
    let run = deployed_chain().await;
    let order = sort(&run.graph).unwrap();
    run.dest.fail_delete(run.new_id(&id('c')), "item is delete protected");

    let summary = delete_all(
        &run.graph,
        &order,
        &run.handlers,
        &run.summary.dictionary,
        DeleteMode::Unchecked,
        &DeleteOptions::default(),
    )
    .await;

    assert_eq!(summary.deleted.len(), 2);
    assert_eq!(summary.not_deleted.len(), 1);
    assert!(matches!(
        &summary.not_deleted[0].status,
        DeletionStatus::Failed { error } if error.contains("item is delete protected")
    ));
    assert_eq!(
        run.dest.deleted_ids(),
        vec![run.new_id(&id('c')), run.new_id(&id('b')), run.new_id(&id('a'))]
    );
    assert!(run.dest.contains(&run.new_id(&id('c'))));
}

#[tokio::test]
async fn test_partial_deployment_deletes_only_what_was_created() {
    let source = common::chain().into_iter().fold(MemoryPlatform::new(), MemoryPlatform::with_resource);
    let graph = build_graph(&[id('c')], &source, &ExtractorRegistry::with_builtins(), &BuildOptions::default())
        .await
        .unwrap();
    let dest = Arc::new(MemoryPlatform::new());
    dest.fail_create(id('b'), "quota exceeded");
    let handlers = dest.handlers(TYPES);
    let deployment = deploy_graph(
        &graph,
        &handlers,
        dest.as_ref(),
        &DeployContext::default(),
        &DeployOptions::default(),
        &mut soldeploy_cli::utils::NoProgress,
    )
    .await
    .unwrap();

    let summary = delete_all(
        &graph,
        &sort(&graph).unwrap(),
        &handlers,
        &deployment.dictionary,
        DeleteMode::Unchecked,
        &DeleteOptions::default(),
    )
    .await;

    assert_eq!(summary.deleted.len(), 1);
    assert!(summary.is_deleted(&id('a')));
    let not_deployed: Vec<&str> = summary
        .not_deleted
        .iter()
        .filter(|r| r.status == DeletionStatus::NotDeployed)
        .map(|r| r.token.as_str())
        .collect();
    assert_eq!(not_deployed.len(), 2);
    assert_eq!(dest.deleted_ids().len(), 1);
}

fn service(c: char) -> Resource {
    Resource::new(id(c), "Feature Service").with_base(json!({"title": format!("Layer {c}")}))
}

#[tokio::test]
async fn test_unchecked_deletions_respect_the_cap() {
    let services: Vec<Resource> = ['1', '2', '3', '4', '5', '6'].into_iter().map(service).collect();
    let roots: Vec<String> = services.iter().map(|r| r.id.clone()).collect();
    let run = deployed(services, &roots).await;
    for root in &roots {
        run.dest.delay_delete(run.new_id(root), Duration::from_millis(30));
    }
    let options = DeleteOptions {
        max_parallel: 2,
        ..DeleteOptions::default()
    };

    let summary = delete_all(
        &run.graph,
        &sort(&run.graph).unwrap(),
        &run.handlers,
        &run.summary.dictionary,
        DeleteMode::Unchecked,
        &options,
    )
    .await;

    assert_eq!(summary.deleted.len(), 6);
    assert_eq!(run.dest.peak_deletes_in_flight(), 2);
}

#[tokio::test]
async fn test_slow_unrelated_deletion_does_not_delay_the_chain() {
    let mut resources = common::chain();
    resources.push(service('9'));
    let run = deployed(resources, &[id('c'), id('9')]).await;
    run.dest.delay_delete(run.new_id(&id('9')), Duration::from_millis(300));

    let summary = delete_all(
        &run.graph,
        &sort(&run.graph).unwrap(),
        &run.handlers,
        &run.summary.dictionary,
        DeleteMode::Unchecked,
        &DeleteOptions::default(),
    )
    .await;

    // outcomes are logged as deletions complete
    let expected: Vec<String> = ['c', 'b', 'a', '9'].into_iter().map(|c| format!("Deleted {}", id(c))).collect();
    assert_eq!(summary.log, expected);
}
