//! File-backed platform.
//!
//! A [`LocalPortal`] is a directory standing in for a portal organization:
//!
//! ```text
//! <root>/
//! ├── portal.toml        # org_id, base_url, username
//! └── items/
//!     └── <id>.json      # one serialized Resource per item
//! ```
//!
//! It implements every collaborator contract the orchestrators consume, so
//! the CLI can package from one directory and deploy into another without a
//! network. Writes are serialized through one lock per portal.

use anyhow::{Context, Result as AnyResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use crate::core::{Resource, Result, SolutionError};
use crate::deploy::DeployContext;
use crate::extractor::ExtractorRegistry;
use crate::handlers::{CreatedResource, GroupSharing, HandlerRegistry, ResourceSource, TypeHandler};
use crate::template::MaterializedTemplate;
use crate::tokens::RunContext;

const SETTINGS_FILE: &str = "portal.toml";
const ITEMS_DIR: &str = "items";

/// Contents of `portal.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSettings {
    /// Organization id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Base url, without a trailing slash
    pub base_url: String,
    /// Acting user name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A portal stored in a directory.
#[derive(Debug)]
pub struct LocalPortal {
    root: PathBuf,
    settings: PortalSettings,
    writes: Mutex<()>,
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl LocalPortal {
    /// Create the directory layout at `root` and write `settings`.
    pub async fn init(root: impl Into<PathBuf>, settings: PortalSettings) -> AnyResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(ITEMS_DIR))
            .await
            .with_context(|| format!("Failed to create portal directory {}", root.display()))?;
        let content = toml::to_string_pretty(&settings).context("Failed to serialize portal settings")?;
        fs::write(root.join(SETTINGS_FILE), content)
            .await
            .with_context(|| format!("Failed to write {}", root.join(SETTINGS_FILE).display()))?;
        Ok(Self::with_settings(root, settings))
    }

    /// Open an existing portal directory.
    pub async fn open(root: impl Into<PathBuf>) -> AnyResult<Self> {
        let root = root.into();
        let path = root.join(SETTINGS_FILE);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read portal settings from {}", path.display()))?;
        let settings: PortalSettings = toml::from_str(&content).map_err(|e| SolutionError::ConfigError {
            message: format!("{}: {e}", path.display()),
        })?;
        Ok(Self::with_settings(root, settings))
    }

    fn with_settings(root: PathBuf, mut settings: PortalSettings) -> Self {
        settings.base_url = settings.base_url.trim_end_matches('/').to_string();
        Self {
            root,
            settings,
            writes: Mutex::new(()),
        }
    }

    /// Portal root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Settings from `portal.toml`.
    #[must_use]
    pub const fn settings(&self) -> &PortalSettings {
        &self.settings
    }

    /// The run-wide context for deploying into this portal.
    #[must_use]
    pub fn run_context(&self) -> RunContext {
        RunContext {
            org_id: self.settings.org_id.clone(),
            portal_base_url: Some(self.settings.base_url.clone()),
            username: self.settings.username.clone(),
        }
    }

    fn item_path(&self, id: &str) -> PathBuf {
        self.root.join(ITEMS_DIR).join(format!("{id}.json"))
    }

    /// Default url of item `id`.
    #[must_use]
    pub fn item_url(&self, id: &str) -> String {
        format!("{}/home/item.html?id={id}", self.settings.base_url)
    }

    /// Read item `id`.
    pub async fn read(&self, id: &str) -> Result<Resource> {
        if !is_safe_id(id) {
            return Err(SolutionError::ResourceNotFound { id: id.to_string() });
        }
        let path = self.item_path(id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SolutionError::ResourceNotFound { id: id.to_string() });
            }
            Err(e) => {
                return Err(SolutionError::ResourceInaccessible {
                    id: id.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&content).map_err(|e| SolutionError::ResourceInaccessible {
            id: id.to_string(),
            reason: format!("unreadable item file: {e}"),
        })
    }

    /// Write `resource` under its id, replacing any previous version.
    pub async fn put(&self, resource: &Resource) -> AnyResult<()> {
        let _guard = self.writes.lock().await;
        self.write_unlocked(resource).await
    }

    async fn write_unlocked(&self, resource: &Resource) -> AnyResult<()> {
        anyhow::ensure!(is_safe_id(&resource.id), "invalid item id '{}'", resource.id);
        let path = self.item_path(&resource.id);
        let content = serde_json::to_string_pretty(resource)?;
        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write item {}", path.display()))
    }

    /// Remove item `id`.
    pub async fn remove(&self, id: &str) -> AnyResult<()> {
        let _guard = self.writes.lock().await;
        anyhow::ensure!(is_safe_id(id), "invalid item id '{id}'");
        match fs::remove_file(self.item_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SolutionError::ResourceNotFound { id: id.to_string() }.into())
            }
            Err(e) => Err::<(), _>(e).with_context(|| format!("Failed to delete item {id}")),
        }
    }

    /// Ids of every stored item, sorted.
    pub fn item_ids(&self) -> AnyResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(self.root.join(ITEMS_DIR)).min_depth(1).max_depth(1) {
            let entry = entry.context("Failed to list portal items")?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Handlers creating items in this portal, for every built-in type.
    #[must_use]
    pub fn handlers(self: &Arc<Self>) -> HandlerRegistry {
        let handler: Arc<dyn TypeHandler> = Arc::new(LocalItemHandler {
            portal: Arc::clone(self),
        });
        let mut registry = HandlerRegistry::new();
        registry.register_all(ExtractorRegistry::with_builtins().types(), &handler);
        registry
    }
}

impl ResourceSource for LocalPortal {
    fn fetch<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Resource>> {
        self.read(id).boxed()
    }
}

impl GroupSharing for LocalPortal {
    fn share_to_group<'a>(
        &'a self,
        resource_id: &'a str,
        group_id: &'a str,
        acting_identity: Option<&'a str>,
    ) -> BoxFuture<'a, AnyResult<()>> {
        async move {
            let _guard = self.writes.lock().await;
            let mut resource = self.read(resource_id).await?;
            if !resource.group_ids.iter().any(|g| g == group_id) {
                resource.group_ids.push(group_id.to_string());
                self.write_unlocked(&resource).await?;
            }
            tracing::debug!(
                "Shared {resource_id} into {group_id} as {}",
                acting_identity.unwrap_or("the acting user")
            );
            Ok(())
        }
        .boxed()
    }
}

/// Creates and deletes items in a [`LocalPortal`].
#[derive(Debug, Clone)]
pub struct LocalItemHandler {
    portal: Arc<LocalPortal>,
}

impl LocalItemHandler {
    /// A handler for `portal`.
    #[must_use]
    pub const fn new(portal: Arc<LocalPortal>) -> Self {
        Self { portal }
    }
}

impl TypeHandler for LocalItemHandler {
    fn create_from_template<'a>(
        &'a self,
        template: &'a MaterializedTemplate,
        context: &'a DeployContext,
    ) -> BoxFuture<'a, AnyResult<CreatedResource>> {
        async move {
            let new_id = uuid::Uuid::new_v4().simple().to_string();
            let mut base = match &template.item {
                Value::Object(map) => map.clone(),
                _ => serde_json::Map::new(),
            };

            let url = match base.get("url").and_then(Value::as_str) {
                Some(url) if !url.is_empty() => url.to_string(),
                _ => self.portal.item_url(&new_id),
            };
            base.insert("id".to_string(), Value::String(new_id.clone()));
            base.insert("url".to_string(), Value::String(url.clone()));
            if let Some(folder) = &context.folder_id {
                base.insert("ownerFolder".to_string(), Value::String(folder.clone()));
            }

            let resource = Resource {
                id: new_id.clone(),
                resource_type: template.resource_type.clone(),
                base: Value::Object(base),
                data: template.data.clone(),
                attachments: template.attachments.clone(),
                group_ids: Vec::new(),
            };
            self.portal.put(&resource).await?;
            tracing::debug!("Created {} as {new_id}", template.token);

            let mut created = CreatedResource::new(new_id).with_url(url);
            created.folder_id.clone_from(&context.folder_id);
            Ok(created)
        }
        .boxed()
    }

    fn delete_resource<'a>(&'a self, id: &'a str) -> BoxFuture<'a, AnyResult<()>> {
        self.portal.remove(id).boxed()
    }
}
