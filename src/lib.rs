//! soldeploy - solution packaging and redeployment
//!
//! Packages a set of interrelated portal items into a self-contained,
//! dependency-ordered bundle of templates, then recreates them in another
//! portal, optionally removing them again later.
//!
//! # Architecture Overview
//!
//! A run moves through three stages:
//! - **Package**: the graph builder walks outward from the root items,
//!   extracting dependencies per type, and templatizes every document so
//!   concrete ids become `{{token.field}}` placeholders
//! - **Order**: the resolver topologically sorts the graph; cycles are
//!   rejected before anything is created
//! - **Deploy**: the orchestrator creates templates dependencies first, many
//!   at once, substituting placeholders from the dictionary of what has been
//!   created so far
//!
//! # Core Modules
//!
//! ## Model
//! - [`core`] - Error taxonomy and the resource data model
//! - [`constants`] - Identifier shape, placeholder grammar, defaults
//! - [`tokens`] - Placeholder codec and the run dictionary
//! - [`archive`] - Rewriting placeholders inside zip payloads
//!
//! ## Packaging
//! - [`extractor`] - Per-type dependency extraction
//! - [`template`] - Templates, the template graph, bundles, and the graph builder
//! - [`resolver`] - Build order and hierarchy display
//!
//! ## Deployment
//! - [`handlers`] - Collaborator contracts
//! - [`deploy`] - Deployment orchestrator and group sharing
//! - [`delete`] - Deletion orchestrator
//! - [`portal`] - Directory-backed platform
//!
//! ## Supporting Modules
//! - [`config`] - Global configuration (`~/.soldeploy/config.toml`)
//! - [`utils`] - Progress reporting
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use soldeploy_cli::extractor::ExtractorRegistry;
//! use soldeploy_cli::portal::LocalPortal;
//! use soldeploy_cli::resolver::sort;
//! use soldeploy_cli::template::{BuildOptions, build_graph};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let source = LocalPortal::open("./source").await?;
//! let roots = vec!["0123456789abcdef0123456789abcdef".to_string()];
//! let graph = build_graph(&roots, &source, &ExtractorRegistry::with_builtins(), &BuildOptions::default()).await?;
//! for token in sort(&graph)?.iter() {
//!     println!("{token}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod delete;
pub mod deploy;
pub mod extractor;
pub mod handlers;
pub mod portal;
pub mod resolver;
pub mod template;
pub mod tokens;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
