//! Templates, the template graph, and the portable solution bundle.
//!
//! A [`Template`] is the transfer-ready form of a resource: every concrete id
//! and url it references has been replaced by a placeholder. Templates are
//! immutable once built. Deployment never edits a template in place; it
//! produces a [`MaterializedTemplate`] copy with placeholders substituted, so
//! the same graph can be deployed repeatedly or previewed.

pub mod builder;
mod bundle;

pub use builder::{BuildOptions, build_graph};
pub use bundle::{SolutionBundle, SolutionMetadata};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::archive::{Archive, detemplatize_archive};
use crate::core::{Attachment, AttachmentContent, ResourceData, ResourceType, Result, SolutionError};
use crate::tokens::{
    RunContext, TemplateDictionary, detemplatize, detemplatize_str, find_unresolved,
    find_unresolved_str, placeholder_paths, placeholder_paths_str,
};

/// The transfer-ready form of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Symbolic key, normally the original resource id
    pub token: String,
    /// Resource kind; selects the type handler at deployment
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Base document with placeholders
    pub item_doc: Value,
    /// Payload with placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_doc: Option<ResourceData>,
    /// Attachments with placeholders
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Tokens that must exist before this one, deduplicated in encounter order
    #[serde(default)]
    pub dependency_tokens: Vec<String>,
    /// Groups to share the deployed resource into
    #[serde(default)]
    pub group_tokens: Vec<String>,
    /// The tracking group of a tracking view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_group_token: Option<String>,
    /// Relative creation effort
    pub cost_weight: u32,
}

impl Template {
    /// The item title, if the base document has one.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.item_doc.get("title").and_then(Value::as_str)
    }

    /// Whether this template is a tracking view with an originating group.
    #[must_use]
    pub const fn is_tracking_view(&self) -> bool {
        self.tracking_group_token.is_some()
    }

    /// A copy with every placeholder substituted.
    ///
    /// Fails with [`SolutionError::UnresolvedToken`] on the first placeholder
    /// that neither `dictionary` nor `context` can resolve.
    pub fn materialize(
        &self,
        dictionary: &TemplateDictionary,
        context: &RunContext,
    ) -> Result<MaterializedTemplate> {
        let item = detemplatize(&self.item_doc, dictionary, context)?;
        let data = match &self.data_doc {
            None => None,
            Some(ResourceData::Json(doc)) => Some(ResourceData::Json(detemplatize(doc, dictionary, context)?)),
            Some(ResourceData::Archive(bytes)) => {
                Some(ResourceData::Archive(detemplatize_archive(bytes, dictionary, context)?))
            }
        };

        let mut attachments = Vec::with_capacity(self.attachments.len());
        for attachment in &self.attachments {
            let content = match &attachment.content {
                AttachmentContent::Text(text) => {
                    AttachmentContent::Text(detemplatize_str(text, dictionary, context)?)
                }
                AttachmentContent::Archive(bytes) => {
                    AttachmentContent::Archive(detemplatize_archive(bytes, dictionary, context)?)
                }
                AttachmentContent::Binary(bytes) => AttachmentContent::Binary(bytes.clone()),
            };
            attachments.push(Attachment {
                name: attachment.name.clone(),
                content,
            });
        }

        Ok(MaterializedTemplate {
            token: self.token.clone(),
            resource_type: self.resource_type.clone(),
            item,
            data,
            attachments,
        })
    }

    /// Every placeholder path in the template, deduplicated in encounter order.
    pub fn placeholders(&self) -> Result<Vec<String>> {
        let mut paths = placeholder_paths(&self.item_doc);
        let mut extend = |found: Vec<String>| {
            for path in found {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        };

        match &self.data_doc {
            Some(ResourceData::Json(doc)) => extend(placeholder_paths(doc)),
            Some(ResourceData::Archive(bytes)) => extend(archive_placeholders(bytes)?),
            None => {}
        }
        for attachment in &self.attachments {
            match &attachment.content {
                AttachmentContent::Text(text) => extend(placeholder_paths_str(text)),
                AttachmentContent::Archive(bytes) => extend(archive_placeholders(bytes)?),
                AttachmentContent::Binary(_) => {}
            }
        }
        Ok(paths)
    }

    /// Placeholders that `dictionary` and `context` cannot resolve.
    ///
    /// Preview counterpart of [`Template::materialize`]; never fails on a miss.
    pub fn unresolved(
        &self,
        dictionary: &TemplateDictionary,
        context: &RunContext,
    ) -> Result<Vec<String>> {
        let mut missing = find_unresolved(&self.item_doc, dictionary, context);
        let mut extend = |found: Vec<String>| {
            for path in found {
                if !missing.contains(&path) {
                    missing.push(path);
                }
            }
        };

        if let Some(ResourceData::Json(doc)) = &self.data_doc {
            extend(find_unresolved(doc, dictionary, context));
        }
        for attachment in &self.attachments {
            if let AttachmentContent::Text(text) = &attachment.content {
                extend(find_unresolved_str(text, dictionary, context));
            }
        }

        let archives = self
            .data_doc
            .iter()
            .filter_map(|data| match data {
                ResourceData::Archive(bytes) => Some(bytes),
                ResourceData::Json(_) => None,
            })
            .chain(self.attachments.iter().filter_map(|a| match &a.content {
                AttachmentContent::Archive(bytes) => Some(bytes),
                _ => None,
            }));
        for bytes in archives {
            let archive = Archive::from_bytes(bytes)?;
            for entry in archive.entries() {
                if let Some(text) = entry.text() {
                    extend(find_unresolved_str(text, dictionary, context));
                }
            }
        }
        Ok(missing)
    }
}

fn archive_placeholders(bytes: &[u8]) -> Result<Vec<String>> {
    let archive = Archive::from_bytes(bytes)?;
    let mut paths = Vec::new();
    for text in archive.entries().iter().filter_map(|entry| entry.text()) {
        for path in placeholder_paths_str(text) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    Ok(paths)
}

/// A template with its placeholders substituted, ready for a type handler.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedTemplate {
    /// Token of the source template
    pub token: String,
    /// Resource kind
    pub resource_type: ResourceType,
    /// Concrete base document
    pub item: Value,
    /// Concrete payload
    pub data: Option<ResourceData>,
    /// Concrete attachments
    pub attachments: Vec<Attachment>,
}

/// Mapping from token to template.
///
/// Every token named by a template's `dependency_tokens` or `group_tokens`
/// is either a key of the graph or listed in `external`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateGraph {
    templates: BTreeMap<String, Template>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    external: BTreeSet<String>,
}

impl TemplateGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `template` under its token, replacing any previous one.
    pub fn insert(&mut self, template: Template) {
        self.external.remove(&template.token);
        self.templates.insert(template.token.clone(), template);
    }

    /// Mark `token` as existing outside the graph.
    pub fn mark_external(&mut self, token: impl Into<String>) {
        let token = token.into();
        if !self.templates.contains_key(&token) {
            self.external.insert(token);
        }
    }

    /// The template for `token`.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<&Template> {
        self.templates.get(token)
    }

    /// Whether `token` is a template of this graph.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.templates.contains_key(token)
    }

    /// Whether `token` is marked external.
    #[must_use]
    pub fn is_external(&self, token: &str) -> bool {
        self.external.contains(token)
    }

    /// Tokens marked external.
    pub fn external(&self) -> impl Iterator<Item = &str> {
        self.external.iter().map(String::as_str)
    }

    /// Templates in token order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Template)> {
        self.templates.iter().map(|(token, template)| (token.as_str(), template))
    }

    /// Template tokens in order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the graph has no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Reverse dependency edges: each template token mapped to the tokens of
    /// templates that depend on it. Each dependent appears once, in token order.
    #[must_use]
    pub fn dependents(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut dependents: BTreeMap<&str, Vec<&str>> =
            self.tokens().map(|token| (token, Vec::new())).collect();
        for (token, template) in self.iter() {
            let deps: BTreeSet<&str> = template.dependency_tokens.iter().map(String::as_str).collect();
            for dep in deps {
                if let Some(list) = dependents.get_mut(dep) {
                    list.push(token);
                }
            }
        }
        dependents
    }

    /// Check that every referenced token is in the graph or external.
    pub fn validate(&self) -> Result<()> {
        for (token, template) in self.iter() {
            let referenced = template
                .dependency_tokens
                .iter()
                .chain(&template.group_tokens)
                .chain(template.tracking_group_token.iter());
            for other in referenced {
                if !self.contains(other) && !self.is_external(other) {
                    return Err(SolutionError::InvariantViolation {
                        message: format!("'{token}' references '{other}', which is neither in the graph nor external"),
                    });
                }
            }
        }
        Ok(())
    }
}
