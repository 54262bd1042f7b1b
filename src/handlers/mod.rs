//! Collaborator contracts consumed by the orchestrators.
//!
//! The orchestrators never talk to a platform directly. Reading resources,
//! creating and deleting them, sharing into groups, and the interactive
//! deletion gate are all injected through the traits here. Futures are boxed
//! so the traits stay object safe and registries can hold handlers for many
//! resource types side by side.
//!
//! A missing handler is not a crash: [`HandlerRegistry::get`] returns
//! [`SolutionError::UnimplementedType`] and the orchestrators turn that into
//! a skip-with-warning record.

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{Resource, ResourceType, Result, SolutionError};
use crate::delete::ResourceSummary;
use crate::deploy::DeployContext;
use crate::template::MaterializedTemplate;
use crate::tokens::ResolutionRecord;

/// Reads live resources from the source platform.
pub trait ResourceSource: Send + Sync {
    /// Fetch one resource.
    ///
    /// Must fail with [`SolutionError::ResourceNotFound`] or
    /// [`SolutionError::ResourceInaccessible`] when the id cannot be read.
    fn fetch<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Resource>>;
}

/// Shares deployed resources into groups.
pub trait GroupSharing: Send + Sync {
    /// Share `resource_id` into `group_id`, as `acting_identity` when given
    /// and as the acting user otherwise.
    fn share_to_group<'a>(
        &'a self,
        resource_id: &'a str,
        group_id: &'a str,
        acting_identity: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// What a type handler reports after creating a resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatedResource {
    /// Id of the new resource
    pub new_id: String,
    /// Url of the new resource
    pub url: Option<String>,
    /// Folder the resource was created in
    pub folder_id: Option<String>,
    /// Extra fields other templates may reference
    pub extra: Map<String, Value>,
}

impl CreatedResource {
    /// A result holding only the new id.
    pub fn new(new_id: impl Into<String>) -> Self {
        Self {
            new_id: new_id.into(),
            ..Self::default()
        }
    }

    /// Set the url.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl From<CreatedResource> for ResolutionRecord {
    fn from(created: CreatedResource) -> Self {
        Self {
            new_id: created.new_id,
            url: created.url,
            folder_id: created.folder_id,
            extra: created.extra,
        }
    }
}

/// Per-type create and delete capability.
pub trait TypeHandler: Send + Sync {
    /// Create a resource from a materialized template.
    fn create_from_template<'a>(
        &'a self,
        template: &'a MaterializedTemplate,
        context: &'a DeployContext,
    ) -> BoxFuture<'a, anyhow::Result<CreatedResource>>;

    /// Delete the resource `id`.
    fn delete_resource<'a>(&'a self, id: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Interactive gate for checked deletion.
pub trait ConfirmDeletion: Send + Sync {
    /// Whether `token` (described by `summary`) may be deleted.
    fn confirm<'a>(&'a self, token: &'a str, summary: &'a ResourceSummary) -> BoxFuture<'a, bool>;
}

/// Registry from resource type to handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ResourceType, Arc<dyn TypeHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().map(ResourceType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("HandlerRegistry").field("types", &types).finish()
    }
}

impl HandlerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `resource_type`.
    pub fn register(&mut self, resource_type: impl Into<ResourceType>, handler: Arc<dyn TypeHandler>) {
        self.handlers.insert(resource_type.into(), handler);
    }

    /// Register one handler for several types.
    pub fn register_all<I, T>(&mut self, types: I, handler: &Arc<dyn TypeHandler>)
    where
        I: IntoIterator<Item = T>,
        T: Into<ResourceType>,
    {
        for resource_type in types {
            self.register(resource_type, Arc::clone(handler));
        }
    }

    /// The handler for `resource_type`.
    pub fn get(&self, resource_type: &ResourceType) -> Result<Arc<dyn TypeHandler>> {
        self.handlers.get(resource_type).cloned().ok_or_else(|| SolutionError::UnimplementedType {
            resource_type: resource_type.to_string(),
        })
    }

    /// Whether a handler is registered for `resource_type`.
    #[must_use]
    pub fn contains(&self, resource_type: &ResourceType) -> bool {
        self.handlers.contains_key(resource_type)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
