//! In-memory platform fixtures.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::core::{Resource, Result, SolutionError};
use crate::delete::ResourceSummary;
use crate::deploy::DeployContext;
use crate::handlers::{
    ConfirmDeletion, CreatedResource, GroupSharing, HandlerRegistry, ResourceSource, TypeHandler,
};
use crate::template::MaterializedTemplate;

/// Base url of the simulated destination.
pub const MEMORY_BASE_URL: &str = "https://dest.example.com/portal";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One collaborator call observed by a [`MemoryPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    /// `create_from_template` for a token
    Create {
        /// Template token
        token: String,
    },
    /// `delete_resource` for an id
    Delete {
        /// Resource id
        id: String,
    },
    /// `share_to_group`
    Share {
        /// Shared resource
        resource_id: String,
        /// Destination group
        group_id: String,
        /// Identity the share was made as
        identity: Option<String>,
    },
}

#[derive(Default)]
struct Script {
    fail_create: HashMap<String, String>,
    fail_delete: HashMap<String, String>,
    fail_share: HashMap<String, String>,
    unreadable: HashSet<String>,
    delays: HashMap<String, Duration>,
    delete_delays: HashMap<String, Duration>,
}

/// A platform held in memory, acting as source, handler, and sharing target.
///
/// Created ids are sequential 32-digit hex strings so tests can predict them.
#[derive(Default)]
pub struct MemoryPlatform {
    items: Mutex<BTreeMap<String, Resource>>,
    script: Mutex<Script>,
    calls: Mutex<Vec<PlatformCall>>,
    next_id: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    deletes_in_flight: AtomicUsize,
    delete_peak: AtomicUsize,
}

impl MemoryPlatform {
    /// An empty platform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `resource` and return the platform.
    #[must_use]
    pub fn with_resource(self, resource: Resource) -> Self {
        self.insert(resource);
        self
    }

    /// Add or replace `resource`.
    pub fn insert(&self, resource: Resource) {
        lock(&self.items).insert(resource.id.clone(), resource);
    }

    /// The stored resource `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Resource> {
        lock(&self.items).get(id).cloned()
    }

    /// Whether `id` is stored.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        lock(&self.items).contains_key(id)
    }

    /// Make creation of `token` fail with `message`.
    pub fn fail_create(&self, token: impl Into<String>, message: impl Into<String>) {
        lock(&self.script).fail_create.insert(token.into(), message.into());
    }

    /// Make deletion of `id` fail with `message`.
    pub fn fail_delete(&self, id: impl Into<String>, message: impl Into<String>) {
        lock(&self.script).fail_delete.insert(id.into(), message.into());
    }

    /// Make shares into `group_id` fail with `message`.
    pub fn fail_share(&self, group_id: impl Into<String>, message: impl Into<String>) {
        lock(&self.script).fail_share.insert(group_id.into(), message.into());
    }

    /// Make `id` exist but refuse to be read.
    pub fn deny_read(&self, id: impl Into<String>) {
        lock(&self.script).unreadable.insert(id.into());
    }

    /// Hold creation of `token` for `delay`.
    pub fn delay_create(&self, token: impl Into<String>, delay: Duration) {
        lock(&self.script).delays.insert(token.into(), delay);
    }

    /// Hold deletion of item `id` for `delay`.
    pub fn delay_delete(&self, id: impl Into<String>, delay: Duration) {
        lock(&self.script).delete_delays.insert(id.into(), delay);
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PlatformCall> {
        lock(&self.calls).clone()
    }

    /// Tokens passed to `create_from_template`, in call order.
    #[must_use]
    pub fn created_tokens(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Create { token } => Some(token),
                _ => None,
            })
            .collect()
    }

    /// Ids passed to `delete_resource`, in call order.
    #[must_use]
    pub fn deleted_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Delete { id } => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Most creations observed in flight at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Most deletions observed in flight at once.
    #[must_use]
    pub fn peak_deletes_in_flight(&self) -> usize {
        self.delete_peak.load(Ordering::SeqCst)
    }

    /// A registry mapping each of `types` to this platform.
    #[must_use]
    pub fn handlers(self: &Arc<Self>, types: &[&str]) -> HandlerRegistry {
        let handler: Arc<dyn TypeHandler> = Arc::clone(self) as Arc<dyn TypeHandler>;
        let mut registry = HandlerRegistry::new();
        registry.register_all(types.iter().copied(), &handler);
        registry
    }

    fn record(&self, call: PlatformCall) {
        lock(&self.calls).push(call);
    }
}

impl ResourceSource for MemoryPlatform {
    fn fetch<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Resource>> {
        async move {
            if lock(&self.script).unreadable.contains(id) {
                return Err(SolutionError::ResourceInaccessible {
                    id: id.to_string(),
                    reason: "not shared with the acting user".to_string(),
                });
            }
            self.get(id).ok_or_else(|| SolutionError::ResourceNotFound { id: id.to_string() })
        }
        .boxed()
    }
}

impl TypeHandler for MemoryPlatform {
    fn create_from_template<'a>(
        &'a self,
        template: &'a MaterializedTemplate,
        context: &'a DeployContext,
    ) -> BoxFuture<'a, anyhow::Result<CreatedResource>> {
        async move {
            self.record(PlatformCall::Create {
                token: template.token.clone(),
            });
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let (delay, failure) = {
                let script = lock(&self.script);
                (script.delays.get(&template.token).copied(), script.fail_create.get(&template.token).cloned())
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Some(message) = failure {
                anyhow::bail!(message);
            }

            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let new_id = format!("{n:032x}");
            let url = template
                .item
                .get("url")
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
                .map_or_else(|| format!("{MEMORY_BASE_URL}/home/item.html?id={new_id}"), str::to_string);

            let mut base = template.item.clone();
            if let Value::Object(map) = &mut base {
                map.insert("url".to_string(), Value::String(url.clone()));
            }
            self.insert(Resource {
                id: new_id.clone(),
                resource_type: template.resource_type.clone(),
                base,
                data: template.data.clone(),
                attachments: template.attachments.clone(),
                group_ids: Vec::new(),
            });

            let mut created = CreatedResource::new(new_id).with_url(url);
            created.folder_id.clone_from(&context.folder_id);
            Ok(created)
        }
        .boxed()
    }

    fn delete_resource<'a>(&'a self, id: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            self.record(PlatformCall::Delete { id: id.to_string() });
            let now = self.deletes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.delete_peak.fetch_max(now, Ordering::SeqCst);

            let (delay, failure) = {
                let script = lock(&self.script);
                (script.delete_delays.get(id).copied(), script.fail_delete.get(id).cloned())
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.deletes_in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Some(message) = failure {
                anyhow::bail!(message);
            }
            lock(&self.items)
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| anyhow::anyhow!("item {id} does not exist"))
        }
        .boxed()
    }
}

impl GroupSharing for MemoryPlatform {
    fn share_to_group<'a>(
        &'a self,
        resource_id: &'a str,
        group_id: &'a str,
        acting_identity: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            self.record(PlatformCall::Share {
                resource_id: resource_id.to_string(),
                group_id: group_id.to_string(),
                identity: acting_identity.map(str::to_string),
            });
            if let Some(message) = lock(&self.script).fail_share.get(group_id).cloned() {
                anyhow::bail!(message);
            }
            let mut items = lock(&self.items);
            let resource = items
                .get_mut(resource_id)
                .ok_or_else(|| anyhow::anyhow!("item {resource_id} does not exist"))?;
            if !resource.group_ids.iter().any(|g| g == group_id) {
                resource.group_ids.push(group_id.to_string());
            }
            Ok(())
        }
        .boxed()
    }
}

/// A deletion gate answering from a fixed list.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    declined: HashSet<String>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    /// Approve everything except `declined` tokens.
    pub fn declining<I, S>(declined: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            declined: declined.into_iter().map(Into::into).collect(),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Tokens asked about, in order.
    #[must_use]
    pub fn asked(&self) -> Vec<String> {
        lock(&self.asked).clone()
    }
}

impl ConfirmDeletion for ScriptedConfirm {
    fn confirm<'a>(&'a self, token: &'a str, _summary: &'a ResourceSummary) -> BoxFuture<'a, bool> {
        async move {
            lock(&self.asked).push(token.to_string());
            !self.declined.contains(token)
        }
        .boxed()
    }
}
