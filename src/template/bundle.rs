//! The portable solution artifact.

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use super::TemplateGraph;
use crate::constants::BUNDLE_SCHEMA_VERSION;
use crate::core::{Result, SolutionError};

/// Companion metadata written alongside the templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionMetadata {
    /// Bundle schema version
    pub schema_version: Version,
    /// When the bundle was packaged
    pub created_at: DateTime<Utc>,
    /// Base url of the portal the templates were read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_portal: Option<String>,
    /// Resource holding shared thumbnails and attachments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_resource_id: Option<String>,
}

impl SolutionMetadata {
    fn current(source_portal: Option<String>) -> Self {
        Self {
            schema_version: supported_schema(),
            created_at: Utc::now(),
            source_portal,
            thumbnail_resource_id: None,
        }
    }
}

fn supported_schema() -> Version {
    Version::parse(BUNDLE_SCHEMA_VERSION).unwrap_or_else(|_| Version::new(1, 0, 0))
}

/// Template graph plus metadata, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionBundle {
    /// Bundle metadata
    pub metadata: SolutionMetadata,
    /// The templates
    pub templates: TemplateGraph,
}

impl SolutionBundle {
    /// Wrap `templates` with fresh metadata.
    #[must_use]
    pub fn new(templates: TemplateGraph, source_portal: Option<String>) -> Self {
        Self {
            metadata: SolutionMetadata::current(source_portal),
            templates,
        }
    }

    /// Pretty JSON form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a bundle; `label` names it in errors.
    ///
    /// A bundle whose schema major version differs from this build's is
    /// rejected with [`SolutionError::IncompatibleSchema`].
    pub fn from_json(text: &str, label: &str) -> Result<Self> {
        let bundle: Self = serde_json::from_str(text).map_err(|e| SolutionError::BundleParseError {
            file: label.to_string(),
            reason: e.to_string(),
        })?;

        let supported = supported_schema();
        if bundle.metadata.schema_version.major != supported.major {
            return Err(SolutionError::IncompatibleSchema {
                found: bundle.metadata.schema_version.to_string(),
                supported: supported.to_string(),
            });
        }
        Ok(bundle)
    }

    /// Read a bundle file.
    pub async fn load(path: &Path) -> AnyResult<Self> {
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read bundle {}", path.display()))?;
        Ok(Self::from_json(&text, &path.display().to_string())?)
    }

    /// Write the bundle, creating parent directories as needed.
    pub async fn save(&self, path: &Path) -> AnyResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, self.to_json()?)
            .await
            .with_context(|| format!("Failed to write bundle {}", path.display()))
    }
}
