//! Template graph builder.
//!
//! Building runs in two phases:
//!
//! 1. **Closure**: starting from the root ids, fetch resources wave by wave
//!    and run their extractors until no new base id turns up. Each wave is
//!    fetched concurrently. An id is fetched at most once, so shared and even
//!    cyclic references terminate.
//! 2. **Templatize**: with every reachable resource known, build one
//!    [`TokenMap`] and convert each resource into a [`Template`].
//!
//! Running templatization after the closure means every document sees the
//! complete map, which is what a single-pass worklist would produce once it
//! had visited everything.

use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{Template, TemplateGraph};
use crate::archive::templatize_archive;
use crate::constants::{DEFAULT_AUTOMATION_HOST, DEFAULT_MAX_PARALLEL, TRACKING_VIEW_KEYWORD};
use crate::core::{Attachment, AttachmentContent, ExtendedId, Resource, ResourceData, Result, SolutionError};
use crate::extractor::ExtractorRegistry;
use crate::handlers::ResourceSource;
use crate::tokens::{TokenMap, templatize, templatize_str};

/// Options for [`build_graph`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Mark unreadable dependencies external instead of failing
    pub skip_inaccessible: bool,
    /// Concurrent fetches per wave
    pub max_parallel: usize,
    /// Cost weight overrides by lower-cased type name
    pub cost_weights: HashMap<String, u32>,
    /// Base url of the source portal, for the webhook pass
    pub source_base_url: Option<String>,
    /// Host of the automation service, for the webhook pass
    pub automation_host: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            skip_inaccessible: false,
            max_parallel: DEFAULT_MAX_PARALLEL,
            cost_weights: HashMap::new(),
            source_base_url: None,
            automation_host: DEFAULT_AUTOMATION_HOST.to_string(),
        }
    }
}

/// A fetched resource with its extracted dependency base ids.
struct Visited {
    resource: Resource,
    dependencies: Vec<String>,
}

/// Build the template graph reachable from `root_ids`.
///
/// Root ids are normalized to their base id. Every root must be readable;
/// an unreadable dependency fails the build unless
/// [`BuildOptions::skip_inaccessible`] is set, in which case it is marked
/// external and left as a concrete id in the templates.
pub async fn build_graph(
    root_ids: &[String],
    source: &dyn ResourceSource,
    extractors: &ExtractorRegistry,
    options: &BuildOptions,
) -> Result<TemplateGraph> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut frontier: Vec<(String, bool)> = Vec::new();
    for raw in root_ids {
        let id = ExtendedId::parse(raw.trim()).base().to_string();
        if !id.is_empty() && seen.insert(id.clone()) {
            frontier.push((id, true));
        }
    }
    if frontier.is_empty() {
        return Err(SolutionError::EmptyRootIds);
    }

    tracing::info!("Building template graph from {} root item(s)", frontier.len());

    let mut visited: BTreeMap<String, Visited> = BTreeMap::new();
    let mut unreadable = 0_usize;

    while !frontier.is_empty() {
        let wave: Vec<(String, bool, Result<Resource>)> = stream::iter(std::mem::take(&mut frontier))
            .map(|(id, is_root)| async move {
                let fetched = source.fetch(&id).await;
                (id, is_root, fetched)
            })
            .buffer_unordered(options.max_parallel.max(1))
            .collect()
            .await;

        let mut wave = wave;
        wave.sort_by(|a, b| a.0.cmp(&b.0));

        for (id, is_root, fetched) in wave {
            let resource = match fetched {
                Ok(resource) => resource,
                Err(
                    e @ (SolutionError::ResourceNotFound { .. }
                    | SolutionError::ResourceInaccessible { .. }),
                ) if !is_root && options.skip_inaccessible => {
                    tracing::warn!("Treating unreadable dependency {id} as external: {e}");
                    unreadable += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut dependencies = Vec::new();
            for dep in extractors.extract(&resource) {
                let base = dep.base().to_string();
                if base == id || dependencies.contains(&base) {
                    continue;
                }
                if seen.insert(base.clone()) {
                    frontier.push((base.clone(), false));
                }
                dependencies.push(base);
            }
            tracing::debug!("Fetched {id} ({}) with {} dependencies", resource.resource_type, dependencies.len());

            visited.insert(id, Visited { resource, dependencies });
        }
    }

    let mut map = TokenMap::new();
    for (id, v) in &visited {
        map.insert(id.clone(), id.clone(), v.resource.url().map(str::to_string));
    }

    let mut graph = TemplateGraph::new();
    for (id, v) in &visited {
        let template = templatize_resource(id, v, &visited, &map, extractors, options)?;
        for token in template.group_tokens.iter().chain(&template.dependency_tokens) {
            if !visited.contains_key(token) {
                graph.mark_external(token.clone());
            }
        }
        graph.insert(template);
    }

    tracing::info!(
        "Template graph has {} template(s) and {} external reference(s), {unreadable} unreadable",
        graph.len(),
        graph.external().count()
    );
    Ok(graph)
}

fn templatize_resource(
    id: &str,
    visited: &Visited,
    all: &BTreeMap<String, Visited>,
    map: &TokenMap,
    extractors: &ExtractorRegistry,
    options: &BuildOptions,
) -> Result<Template> {
    let resource = &visited.resource;
    // its own id and url only exist once the destination creates it
    let own_token = map.token_for(id).unwrap_or(id).to_string();
    let map = &map.without(id);
    let source_base_url = options.source_base_url.as_deref();
    let host = options.automation_host.as_str();

    let archive = |bytes: &[u8]| templatize_archive(bytes, map, source_base_url, host);

    let data_doc = match &resource.data {
        None => None,
        Some(ResourceData::Json(doc)) => Some(ResourceData::Json(templatize(doc, map))),
        Some(ResourceData::Archive(bytes)) => Some(ResourceData::Archive(archive(bytes)?)),
    };

    let mut attachments = Vec::with_capacity(resource.attachments.len());
    for attachment in &resource.attachments {
        let content = match &attachment.content {
            AttachmentContent::Text(text) => AttachmentContent::Text(templatize_str(text, map)),
            AttachmentContent::Archive(bytes) => AttachmentContent::Archive(archive(bytes)?),
            AttachmentContent::Binary(bytes) => AttachmentContent::Binary(bytes.clone()),
        };
        attachments.push(Attachment {
            name: attachment.name.clone(),
            content,
        });
    }

    // Dependencies that could not be read keep their concrete id.
    let mut dependency_tokens: Vec<String> = visited
        .dependencies
        .iter()
        .map(|dep| map.token_for(dep).unwrap_or(dep).to_string())
        .collect();

    let mut group_tokens: Vec<String> = Vec::new();
    for group in &resource.group_ids {
        let token = map.token_for(group).unwrap_or(group).to_string();
        if !group_tokens.contains(&token) {
            group_tokens.push(token);
        }
    }

    let tracking_group_token = resource
        .has_type_keyword(TRACKING_VIEW_KEYWORD)
        .then(|| resource.base.pointer("/properties/trackViewGroup").and_then(Value::as_str))
        .flatten()
        .filter(|group| !group.is_empty())
        .map(|group| map.token_for(group).unwrap_or(group).to_string());
    if let Some(tracking) = &tracking_group_token
        && !group_tokens.contains(tracking)
    {
        group_tokens.push(tracking.clone());
    }

    // A group that is itself a template has to exist before sharing into it.
    for group in &group_tokens {
        if all.contains_key(group) && group != id && !dependency_tokens.contains(group) {
            dependency_tokens.push(group.clone());
        }
    }

    let cost_weight = options
        .cost_weights
        .get(&resource.resource_type.key())
        .copied()
        .unwrap_or_else(|| extractors.cost_weight(&resource.resource_type))
        .max(1);

    Ok(Template {
        token: own_token,
        resource_type: resource.resource_type.clone(),
        item_doc: templatize(&resource.base, map),
        data_doc,
        attachments,
        dependency_tokens,
        group_tokens,
        tracking_group_token,
        cost_weight,
    })
}
