//! Build a template graph from root items and write it as a bundle.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CliConfig;
use super::common::open_portal;
use crate::extractor::ExtractorRegistry;
use crate::template::{SolutionBundle, build_graph};

/// Package root items and everything they depend on.
#[derive(Args, Debug)]
pub struct PackageCommand {
    /// Source portal directory
    #[arg(long)]
    portal: PathBuf,

    /// Where to write the bundle
    #[arg(short, long)]
    output: PathBuf,

    /// Leave unreadable dependencies external instead of failing
    #[arg(long)]
    skip_inaccessible: bool,

    /// Ids of the root items
    #[arg(required = true, num_args = 1..)]
    root_ids: Vec<String>,
}

impl PackageCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let config = cli.load_global().await?;
        let portal = open_portal(&self.portal).await?;

        let source_base_url = portal.settings().base_url.clone();
        let mut options = config.build_options(Some(source_base_url.clone()));
        options.skip_inaccessible |= self.skip_inaccessible;

        let graph = build_graph(&self.root_ids, portal.as_ref(), &ExtractorRegistry::with_builtins(), &options)
            .await
            .context("Failed to build the template graph")?;

        let mut bundle = SolutionBundle::new(graph, Some(source_base_url));
        bundle.metadata.thumbnail_resource_id = self.root_ids.first().map(|id| id.trim().to_string());
        bundle.save(&self.output).await?;

        let external = bundle.templates.external().count();
        println!(
            "{} Packaged {} template(s) into {}",
            "✓".green(),
            bundle.templates.len(),
            self.output.display()
        );
        if external > 0 {
            println!("  {external} reference(s) left external");
        }
        Ok(())
    }
}
