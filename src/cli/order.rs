//! Print the build order of a bundle.

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use super::common::load_bundle;
use crate::resolver::sort;

/// Output format for `order`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OrderFormat {
    /// One numbered line per template
    Text,
    /// A JSON array of tokens
    Json,
}

/// Print the order templates are created in.
#[derive(Args, Debug)]
pub struct OrderCommand {
    /// Bundle file
    bundle: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OrderFormat,
}

impl OrderCommand {
    pub async fn execute(self) -> Result<()> {
        let bundle = load_bundle(&self.bundle).await?;
        let order = sort(&bundle.templates)?;

        match self.format {
            OrderFormat::Json => println!("{}", serde_json::to_string_pretty(&order)?),
            OrderFormat::Text => {
                for (index, token) in order.iter().enumerate() {
                    let Some(template) = bundle.templates.get(token) else {
                        continue;
                    };
                    println!(
                        "{:>3}. {} {} {}",
                        index + 1,
                        token.bold(),
                        format!("({})", template.resource_type).dimmed(),
                        template.title().unwrap_or_default()
                    );
                }
            }
        }
        Ok(())
    }
}
