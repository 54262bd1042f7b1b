//! Print the dependency hierarchy of a bundle.
//!
//! ```text
//! 1f2e... "Field App" (Web Mapping Application)
//! └── 9c8b... "Field Map" (Web Map)
//!     └── 44aa... "Assets" (Feature Service)
//! ```
//!
//! External references are marked `[external]`.

use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

use super::common::load_bundle;
use crate::resolver::{hierarchy, render_tree};

/// Output format for `tree`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TreeFormat {
    /// Box-drawing tree
    Tree,
    /// Nested JSON nodes
    Json,
}

/// Show which templates depend on which.
#[derive(Args, Debug)]
pub struct TreeCommand {
    /// Bundle file
    bundle: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "tree")]
    format: TreeFormat,
}

impl TreeCommand {
    pub async fn execute(self) -> Result<()> {
        let bundle = load_bundle(&self.bundle).await?;
        let nodes = hierarchy(&bundle.templates);

        match self.format {
            TreeFormat::Json => println!("{}", serde_json::to_string_pretty(&nodes)?),
            TreeFormat::Tree => print!("{}", render_tree(&nodes)),
        }
        Ok(())
    }
}
