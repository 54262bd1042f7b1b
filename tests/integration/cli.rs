//! The `soldeploy` binary against directory-backed portals.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use soldeploy_cli::archive::Archive;
use soldeploy_cli::core::{Resource, ResourceData};
use soldeploy_cli::deploy::DeploymentSummary;
use soldeploy_cli::portal::LocalPortal;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::common::{self, id};

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    async fn with_source(resources: &[Resource]) -> Self {
        let temp = TempDir::new().unwrap();
        common::seed_portal(&temp.path().join("source"), common::SOURCE_BASE_URL, resources).await;
        common::seed_portal(&temp.path().join("dest"), common::DEST_BASE_URL, &[]).await;
        Self { temp }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    fn bundle(&self) -> PathBuf {
        self.path("solution.json")
    }

    fn soldeploy(&self) -> Command {
        let mut cmd = Command::cargo_bin("soldeploy").unwrap();
        cmd.current_dir(self.temp.path())
            .env("SOLDEPLOY_CONFIG", self.path("config.toml"))
            .env("SOLDEPLOY_NO_PROGRESS", "1")
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }

    fn package(&self, root: &str) {
        self.soldeploy()
            .arg("package")
            .arg("--portal")
            .arg(self.path("source"))
            .arg("-o")
            .arg(self.bundle())
            .arg(root)
            .assert()
            .success();
    }

    async fn dest_items(&self) -> Vec<String> {
        LocalPortal::open(self.path("dest")).await.unwrap().item_ids().unwrap()
    }
}

fn read_summary(path: &Path) -> DeploymentSummary {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_package_reports_template_count() {
    let ws = Workspace::with_source(&common::chain()).await;

    ws.soldeploy()
        .arg("package")
        .arg("--portal")
        .arg(ws.path("source"))
        .arg("-o")
        .arg(ws.bundle())
        .arg(id('c'))
        .assert()
        .success()
        .stdout(predicate::str::contains("Packaged 3 template(s)"));

    let bundle: Value = serde_json::from_str(&std::fs::read_to_string(ws.bundle()).unwrap()).unwrap();
    assert_eq!(bundle["metadata"]["sourcePortal"], common::SOURCE_BASE_URL);
    assert_eq!(bundle["metadata"]["thumbnailResourceId"], id('c'));
}

#[tokio::test]
async fn test_package_missing_root_fails() {
    let ws = Workspace::with_source(&common::chain()).await;

    ws.soldeploy()
        .arg("package")
        .arg("--portal")
        .arg(ws.path("source"))
        .arg("-o")
        .arg(ws.bundle())
        .arg(id('9'))
        .assert()
        .failure()
        .stderr(predicate::str::contains(id('9')));
    assert!(!ws.bundle().exists());
}

#[tokio::test]
async fn test_order_and_tree_describe_the_bundle() {
    let ws = Workspace::with_source(&common::chain()).await;
    ws.package(&id('c'));

    let output = ws.soldeploy().arg("order").arg(ws.bundle()).arg("--format").arg("json").output().unwrap();
    assert!(output.status.success());
    let order: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(order, vec![id('a'), id('b'), id('c')]);

    ws.soldeploy()
        .arg("tree")
        .arg(ws.bundle())
        .assert()
        .success()
        .stdout(predicate::str::contains("Asset Viewer"))
        .stdout(predicate::str::contains(id('a')));
}

#[tokio::test]
async fn test_check_needs_a_portal_for_run_wide_tokens() {
    let info = json!({
        "notificationsInfo": {"webhooks": [{"url": "https://workflow.arcgis.com/srcorg/flows/1"}]}
    });
    let mut form = Resource::new(id('f'), "Form").with_base(json!({"title": "Inspection"}));
    form.data = Some(ResourceData::Archive(
        Archive::new().with_text("form.info", info.to_string()).to_bytes().unwrap(),
    ));
    let ws = Workspace::with_source(&[form]).await;
    ws.package(&id('f'));

    ws.soldeploy()
        .arg("check")
        .arg(ws.bundle())
        .assert()
        .failure()
        .stdout(predicate::str::contains("{{user.orgId}}"))
        .stderr(predicate::str::contains("cannot be resolved"));

    ws.soldeploy()
        .arg("check")
        .arg(ws.bundle())
        .arg("--portal")
        .arg(ws.path("dest"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Every placeholder resolves"));
}

#[tokio::test]
async fn test_deploy_then_delete_round_trip() {
    let ws = Workspace::with_source(&common::chain()).await;
    ws.package(&id('c'));

    ws.soldeploy()
        .arg("deploy")
        .arg(ws.bundle())
        .arg("--portal")
        .arg(ws.path("dest"))
        .arg("--folder")
        .arg("solutions")
        .assert()
        .success()
        .stdout(predicate::str::contains("Summary written to"));

    let summary_path = ws.path("solution.deployment.json");
    let summary = read_summary(&summary_path);
    assert!(summary.is_complete_success());
    assert_eq!(summary.dictionary.get(&id('c')).unwrap().folder_id.as_deref(), Some("solutions"));
    assert_eq!(ws.dest_items().await.len(), 3);

    let dest = LocalPortal::open(ws.path("dest")).await.unwrap();
    let app = dest.read(&summary.dictionary.get(&id('c')).unwrap().new_id).await.unwrap();
    let new_map = &summary.dictionary.get(&id('b')).unwrap().new_id;
    assert_eq!(app.json_data().unwrap()["values"]["webmap"], new_map.as_str());

    ws.soldeploy()
        .arg("delete")
        .arg(ws.bundle())
        .arg("--summary")
        .arg(&summary_path)
        .arg("--portal")
        .arg(ws.path("dest"))
        .assert()
        .success();
    assert!(ws.dest_items().await.is_empty());
}

#[tokio::test]
async fn test_interactive_delete_keeps_declined_items() {
    let ws = Workspace::with_source(&common::chain()).await;
    ws.package(&id('c'));
    let summary_path = ws.path("run.json");

    ws.soldeploy()
        .arg("deploy")
        .arg(ws.bundle())
        .arg("--portal")
        .arg(ws.path("dest"))
        .arg("--summary")
        .arg(&summary_path)
        .assert()
        .success();
    let summary = read_summary(&summary_path);

    // asked for the app, then the map, then the service
    ws.soldeploy()
        .arg("delete")
        .arg(ws.bundle())
        .arg("--summary")
        .arg(&summary_path)
        .arg("--portal")
        .arg(ws.path("dest"))
        .arg("--interactive")
        .write_stdin("y\nn\nyes\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("kept {}", id('b'))));

    assert_eq!(ws.dest_items().await, vec![summary.dictionary.get(&id('b')).unwrap().new_id.clone()]);
}

#[tokio::test]
async fn test_invalid_config_file_is_reported() {
    let ws = Workspace::with_source(&common::chain()).await;
    std::fs::write(ws.path("config.toml"), "max_parallel = 0\n").unwrap();

    ws.soldeploy()
        .arg("package")
        .arg("--portal")
        .arg(ws.path("source"))
        .arg("-o")
        .arg(ws.bundle())
        .arg(id('c'))
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_parallel must be at least 1"));
}

#[tokio::test]
async fn test_deploy_missing_bundle_fails() {
    let ws = Workspace::with_source(&[]).await;

    ws.soldeploy()
        .arg("deploy")
        .arg(ws.path("nope.json"))
        .arg("--portal")
        .arg(ws.path("dest"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.json"));
}
