//! Configuration management for soldeploy.
//!
//! There is a single layer, the user-wide [`GlobalConfig`]. Bundles and
//! deployment summaries carry everything else a run needs, so there is no
//! project file.
//!
//! **Location:**
//! - `$SOLDEPLOY_CONFIG` when set
//! - Unix/macOS: `~/.soldeploy/config.toml`
//! - Windows: `%LOCALAPPDATA%\soldeploy\config.toml`
//!
//! The CLI `--config` flag takes precedence over both.

mod global;

pub use global::GlobalConfig;
