//! Command-line interface for soldeploy.
//!
//! # Available Commands
//!
//! - `package` - Build a template graph from a portal and write a bundle
//! - `order` - Print the build order of a bundle
//! - `tree` - Print the dependency hierarchy of a bundle
//! - `check` - Report placeholders a deployment could not resolve
//! - `deploy` - Create every template of a bundle in a destination portal
//! - `delete` - Remove the resources a previous deployment created
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - Debug logging
//! - `--quiet` / `-q` - Errors only
//! - `--config` / `-c` - Path to an alternate `config.toml`
//! - `--no-progress` - Hide progress bars (also `SOLDEPLOY_NO_PROGRESS`)
//!
//! # Example
//!
//! ```bash
//! soldeploy package --portal ./source -o solution.json 0123456789abcdef0123456789abcdef
//! soldeploy tree solution.json
//! soldeploy deploy solution.json --portal ./dest --summary run.json
//! soldeploy delete solution.json --summary run.json --portal ./dest --interactive
//! ```

mod check;
pub mod common;
mod delete;
mod deploy;
mod order;
mod package;
mod tree;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::GlobalConfig;
use crate::constants::NO_PROGRESS_ENV;
use crate::utils::ProgressBar;

/// Settings shared by every command, derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: &'static str,
    /// Hide progress bars
    pub no_progress: bool,
    /// Explicit global config path
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Load the global configuration this run uses.
    pub async fn load_global(&self) -> Result<GlobalConfig> {
        GlobalConfig::load_with_optional(self.config_path.clone()).await
    }

    /// A percentage bar, hidden when progress is disabled.
    #[must_use]
    pub fn progress(&self, prefix: &str) -> ProgressBar {
        if self.no_progress {
            ProgressBar::hidden()
        } else {
            ProgressBar::percent(prefix)
        }
    }
}

/// Package and redeploy interrelated portal items.
#[derive(Parser, Debug)]
#[command(
    name = "soldeploy",
    about = "Package interrelated portal items into solution templates and redeploy them",
    version,
    long_about = "soldeploy discovers the items a set of root items depend on, stores them as \
                  placeholder templates in a portable bundle, and recreates them in dependency \
                  order in another portal."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (equivalent to RUST_LOG=debug)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to an alternate global configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long, global = true, env = NO_PROGRESS_ENV)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a template graph from root items and write a bundle
    Package(package::PackageCommand),

    /// Print the build order of a bundle
    Order(order::OrderCommand),

    /// Print the dependency hierarchy of a bundle
    Tree(tree::TreeCommand),

    /// Report placeholders a deployment could not resolve
    Check(check::CheckCommand),

    /// Deploy a bundle into a portal
    Deploy(deploy::DeployCommand),

    /// Delete the resources a deployment created
    Delete(delete::DeleteCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Settings derived from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress || self.quiet,
            config_path: self.config.clone(),
        }
    }

    /// Execute with explicit settings.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Package(cmd) => cmd.execute(&config).await,
            Commands::Order(cmd) => cmd.execute().await,
            Commands::Tree(cmd) => cmd.execute().await,
            Commands::Check(cmd) => cmd.execute().await,
            Commands::Deploy(cmd) => cmd.execute(&config).await,
            Commands::Delete(cmd) => cmd.execute(&config).await,
        }
    }
}
