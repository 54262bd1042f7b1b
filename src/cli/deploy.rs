//! Deploy a bundle into a portal.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CliConfig;
use super::common::{default_summary_path, load_bundle, open_portal, write_json};
use crate::deploy::{DeployContext, DeployOptions, DeploymentStatus, DeploymentSummary, deploy_graph};

/// Create every template of a bundle, dependencies first.
#[derive(Args, Debug)]
pub struct DeployCommand {
    /// Bundle file
    bundle: PathBuf,

    /// Destination portal directory
    #[arg(long)]
    portal: PathBuf,

    /// Where to write the deployment summary [default: <bundle>.deployment.json]
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Destination folder for created items
    #[arg(long)]
    folder: Option<String>,

    /// Identity that owns tracking views
    #[arg(long)]
    tracking_owner: Option<String>,

    /// Creations in flight at once (overrides the config file)
    #[arg(long)]
    max_parallel: Option<usize>,
}

fn print_summary(summary: &DeploymentSummary) {
    for record in &summary.records {
        match &record.status {
            DeploymentStatus::Succeeded => println!(
                "{} {} → {}",
                "✓".green(),
                record.token,
                record.new_id.as_deref().unwrap_or_default()
            ),
            DeploymentStatus::Failed { error } => println!("{} {}: {error}", "✗".red(), record.token),
            DeploymentStatus::Skipped { reason } => {
                println!("{} {}: {reason}", "-".yellow(), record.token);
            }
        }
    }
    for share in summary.shares.iter().filter(|s| s.error.is_some()) {
        println!(
            "{} share {} → {}: {}",
            "✗".red(),
            share.token,
            share.group_token,
            share.error.as_deref().unwrap_or_default()
        );
    }
}

impl DeployCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let config = cli.load_global().await?;
        let bundle = load_bundle(&self.bundle).await?;
        let portal = open_portal(&self.portal).await?;
        let handlers = portal.handlers();

        let context = DeployContext {
            run: portal.run_context(),
            tracking_owner: self.tracking_owner.clone(),
            folder_id: self.folder.clone(),
        };
        let options = DeployOptions {
            max_parallel: self.max_parallel.unwrap_or(config.max_parallel).max(1),
            ..DeployOptions::default()
        };

        let cancel = options.cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; waiting for in-flight creations to finish");
                cancel.cancel();
            }
        });

        let mut bar = cli.progress("Deploying");
        let result = deploy_graph(&bundle.templates, &handlers, portal.as_ref(), &context, &options, &mut bar).await;
        interrupt.abort();
        bar.finish_and_clear();
        let summary = result?;

        print_summary(&summary);
        let summary_path = self.summary.clone().unwrap_or_else(|| default_summary_path(&self.bundle));
        write_json(&summary_path, &summary).await?;
        println!("Summary written to {}", summary_path.display());

        if summary.cancelled {
            bail!("Deployment cancelled after {} template(s)", summary.succeeded().len());
        }
        if !summary.is_complete_success() {
            bail!(
                "{} template(s) failed, {} skipped",
                summary.failed().len(),
                summary.skipped().len()
            );
        }
        Ok(())
    }
}
