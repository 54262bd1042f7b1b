//! Report placeholders a deployment could not resolve.
//!
//! Every template token of the bundle is assumed to resolve once created, so
//! what remains are references to tokens outside the bundle, fields no
//! handler reports, and special tokens the destination context lacks.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{load_bundle, open_portal};
use crate::resolver::sort;
use crate::template::TemplateGraph;
use crate::tokens::{ResolutionRecord, RunContext, TemplateDictionary};

/// List unresolvable placeholders per template.
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Bundle file
    bundle: PathBuf,

    /// Destination portal directory supplying the run-wide values
    #[arg(long)]
    portal: Option<PathBuf>,
}

/// A dictionary in which every template of `graph` is already created.
fn preview_dictionary(graph: &TemplateGraph) -> TemplateDictionary {
    let mut dictionary = TemplateDictionary::new();
    for token in graph.tokens() {
        let record = ResolutionRecord {
            url: Some(format!("preview://{token}")),
            folder_id: Some("preview".to_string()),
            ..ResolutionRecord::new(token)
        };
        dictionary.resolve(token, record);
    }
    dictionary
}

impl CheckCommand {
    pub async fn execute(self) -> Result<()> {
        let bundle = load_bundle(&self.bundle).await?;
        let context = match &self.portal {
            Some(path) => open_portal(path).await?.run_context(),
            None => RunContext::default(),
        };
        let order = sort(&bundle.templates)?;
        let dictionary = preview_dictionary(&bundle.templates);

        let mut missing = 0;
        for token in order.iter() {
            let Some(template) = bundle.templates.get(token) else {
                continue;
            };
            let unresolved = template.unresolved(&dictionary, &context)?;
            if unresolved.is_empty() {
                continue;
            }
            println!("{} {}", token.bold(), format!("({})", template.resource_type).dimmed());
            for placeholder in &unresolved {
                println!("  {} {{{{{placeholder}}}}}", "✗".red());
            }
            missing += unresolved.len();
        }

        if missing > 0 {
            bail!("{missing} placeholder(s) cannot be resolved");
        }
        println!("{} Every placeholder resolves", "✓".green());
        Ok(())
    }
}
