//! Delete the resources a deployment created.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CliConfig;
use super::common::{StdinConfirm, load_bundle, open_portal, read_json};
use crate::delete::{DeleteMode, DeleteOptions, DeletionStatus, delete_all};
use crate::deploy::DeploymentSummary;
use crate::resolver::sort;

/// Remove deployed resources, dependents first.
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Bundle file the deployment was made from
    bundle: PathBuf,

    /// Deployment summary naming the created resources
    #[arg(long)]
    summary: PathBuf,

    /// Portal directory the deployment went into
    #[arg(long)]
    portal: PathBuf,

    /// Confirm each deletion, one at a time
    #[arg(short, long)]
    interactive: bool,
}

impl DeleteCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let config = cli.load_global().await?;
        let bundle = load_bundle(&self.bundle).await?;
        let deployment: DeploymentSummary = read_json(&self.summary)
            .await
            .context("Failed to load the deployment summary")?;
        let portal = open_portal(&self.portal).await?;
        let handlers = portal.handlers();
        let order = sort(&bundle.templates)?;

        let gate = StdinConfirm::new();
        let mode = if self.interactive {
            DeleteMode::Checked(&gate)
        } else {
            DeleteMode::Unchecked
        };
        let options = DeleteOptions {
            max_parallel: config.max_parallel,
            ..DeleteOptions::default()
        };

        let cancel = options.cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; waiting for in-flight deletions to finish");
                cancel.cancel();
            }
        });
        let summary = delete_all(&bundle.templates, &order, &handlers, &deployment.dictionary, mode, &options).await;
        interrupt.abort();

        for record in &summary.deleted {
            println!("{} deleted {}", "✓".green(), record.token);
        }
        let mut failed = 0;
        for record in &summary.not_deleted {
            match &record.status {
                DeletionStatus::Failed { error } => {
                    failed += 1;
                    println!("{} {}: {error}", "✗".red(), record.token);
                }
                DeletionStatus::Declined => println!("{} kept {}", "-".yellow(), record.token),
                DeletionStatus::NotDeployed => println!("{} {} was not deployed", "-".dimmed(), record.token),
                DeletionStatus::Unimplemented => {
                    println!("{} {}: type '{}' cannot be deleted", "-".yellow(), record.token, record.summary.item_type);
                }
                DeletionStatus::Cancelled => println!("{} {} was not attempted", "-".dimmed(), record.token),
                DeletionStatus::Deleted => {}
            }
        }

        if summary.cancelled {
            bail!("Deletion cancelled after {} resource(s)", summary.deleted.len());
        }
        if failed > 0 {
            bail!("{failed} deletion(s) failed");
        }
        Ok(())
    }
}
