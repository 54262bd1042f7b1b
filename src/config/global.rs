//! Global configuration for soldeploy.
//!
//! User-wide tuning lives in `~/.soldeploy/config.toml` (or the file named by
//! `$SOLDEPLOY_CONFIG`). Every field is optional; a missing file means the
//! defaults.
//!
//! ```toml
//! max_parallel = 8
//! skip_inaccessible = true
//! automation_host = "workflow.arcgis.com"
//!
//! [cost_weights]
//! "Feature Service" = 12
//! Dashboard = 2
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::{CONFIG_ENV, DEFAULT_AUTOMATION_HOST, DEFAULT_MAX_PARALLEL};
use crate::core::SolutionError;
use crate::template::BuildOptions;

const fn default_max_parallel() -> usize {
    DEFAULT_MAX_PARALLEL
}

fn default_automation_host() -> String {
    DEFAULT_AUTOMATION_HOST.to_string()
}

/// User-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Creation and deletion calls in flight at once, at least 1
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Leave unreadable dependencies external instead of failing the build
    #[serde(default)]
    pub skip_inaccessible: bool,

    /// Host of the workflow automation service
    #[serde(default = "default_automation_host")]
    pub automation_host: String,

    /// Cost weight overrides by resource type
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cost_weights: BTreeMap<String, u32>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            skip_inaccessible: false,
            automation_host: default_automation_host(),
            cost_weights: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    /// Load from the default location, or defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory is unknown, or the file exists
    /// but cannot be read, parsed, or validated.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_with_optional(Some(path)).await
    }

    /// Load from `path` when given and present; otherwise from the default
    /// location, falling back to defaults.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if fs::try_exists(&path).await.unwrap_or(false) {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config at {}; using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| SolutionError::ConfigError {
            message: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write to `path` as pretty TOML, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))
    }

    /// `$SOLDEPLOY_CONFIG`, or `~/.soldeploy/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("soldeploy")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".soldeploy")
        };
        Ok(config_dir.join("config.toml"))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> std::result::Result<(), SolutionError> {
        if self.max_parallel == 0 {
            return Err(SolutionError::ConfigError {
                message: "max_parallel must be at least 1".to_string(),
            });
        }
        if let Some((name, _)) = self.cost_weights.iter().find(|(_, weight)| **weight == 0) {
            return Err(SolutionError::ConfigError {
                message: format!("cost weight for '{name}' must be positive"),
            });
        }
        Ok(())
    }

    /// Graph builder options derived from this configuration.
    #[must_use]
    pub fn build_options(&self, source_base_url: Option<String>) -> BuildOptions {
        BuildOptions {
            skip_inaccessible: self.skip_inaccessible,
            max_parallel: self.max_parallel,
            cost_weights: self
                .cost_weights
                .iter()
                .map(|(name, weight)| (name.to_lowercase(), *weight))
                .collect(),
            source_base_url,
            automation_host: self.automation_host.clone(),
        }
    }
}
