//! Deletion orchestrator.
//!
//! Deployed resources are removed dependents first, the reverse of build
//! order. Unlike creation, that order is a preference and not a gate: a
//! failed deletion never prevents attempting the others.
//!
//! In unchecked mode a token is dispatched as soon as every template
//! depending on it has been attempted, with at most the configured number of
//! deletions in flight. A slow deletion holds back only its own dependencies.
//! Checked mode is strictly sequential and asks a [`ConfirmDeletion`] gate
//! before each token; the next token is not touched until the gate for the
//! current one has answered.
//!
//! Cancellation is cooperative. Once the token is observed nothing new is
//! dispatched or asked about; in-flight deletions finish and every remaining
//! token is reported as cancelled.

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::constants::DEFAULT_MAX_PARALLEL;
use crate::core::SolutionError;
use crate::handlers::{ConfirmDeletion, HandlerRegistry};
use crate::resolver::BuildOrder;
use crate::template::{Template, TemplateGraph};
use crate::tokens::TemplateDictionary;

/// Metadata shown when confirming or reporting a deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    /// Item title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Resource type
    pub item_type: String,
    /// Last modification time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl ResourceSummary {
    /// Summarize `template` from its item document.
    #[must_use]
    pub fn of(template: &Template) -> Self {
        let modified = template
            .item_doc
            .get("modified")
            .and_then(Value::as_i64)
            .and_then(DateTime::from_timestamp_millis);
        Self {
            title: template.title().map(str::to_string),
            item_type: template.resource_type.to_string(),
            modified,
        }
    }
}

/// Outcome of one deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeletionStatus {
    /// The resource is gone
    Deleted,
    /// The handler call failed
    Failed {
        /// Error detail
        error: String,
    },
    /// The confirmation gate declined
    Declined,
    /// The token has no deployed resource
    NotDeployed,
    /// No handler is registered for the type
    Unimplemented,
    /// The run was cancelled before this token was attempted
    Cancelled,
}

/// Per-token deletion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRecord {
    /// Template token
    pub token: String,
    /// Deployed resource id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Display metadata
    pub summary: ResourceSummary,
    /// Outcome
    #[serde(flatten)]
    pub status: DeletionStatus,
}

/// Deletion results, partitioned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionSummary {
    /// Tokens whose resource is gone
    pub deleted: Vec<DeletionRecord>,
    /// Tokens whose resource is still present (or was never deployed)
    pub not_deleted: Vec<DeletionRecord>,
    /// Human-readable outcomes in processing order
    pub log: Vec<String>,
    /// Whether the run was cancelled before every token was attempted
    #[serde(default)]
    pub cancelled: bool,
}

impl DeletionSummary {
    fn push(&mut self, record: DeletionRecord) {
        let line = match &record.status {
            DeletionStatus::Deleted => format!("Deleted {}", record.token),
            DeletionStatus::Failed { error } => format!("Failed to delete {}: {error}", record.token),
            DeletionStatus::Declined => format!("Kept {}: deletion declined", record.token),
            DeletionStatus::NotDeployed => format!("Kept {}: not deployed", record.token),
            DeletionStatus::Unimplemented => {
                format!("Kept {}: type '{}' is not implemented", record.token, record.summary.item_type)
            }
            DeletionStatus::Cancelled => format!("Kept {}: deletion cancelled", record.token),
        };
        self.log.push(line);
        if record.status == DeletionStatus::Deleted {
            self.deleted.push(record);
        } else {
            self.not_deleted.push(record);
        }
    }

    /// Whether `token` ended up deleted.
    #[must_use]
    pub fn is_deleted(&self, token: &str) -> bool {
        self.deleted.iter().any(|r| r.token == token)
    }
}

/// How deletion proceeds.
#[derive(Clone, Copy)]
pub enum DeleteMode<'a> {
    /// Dependents first, concurrently
    Unchecked,
    /// One token at a time, each confirmed first
    Checked(&'a dyn ConfirmDeletion),
}

/// Options for [`delete_all`].
#[derive(Debug, Clone)]
pub struct DeleteOptions {
    /// Deletions in flight at once in unchecked mode
    pub max_parallel: usize,
    /// Cooperative cancellation signal
    pub cancel: CancellationToken,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            cancel: CancellationToken::new(),
        }
    }
}

fn kept(template: &Template, target_id: Option<String>, status: DeletionStatus) -> DeletionRecord {
    DeletionRecord {
        token: template.token.clone(),
        target_id,
        summary: ResourceSummary::of(template),
        status,
    }
}

async fn delete_one(
    handlers: &HandlerRegistry,
    template: &Template,
    target_id: Option<&str>,
) -> DeletionRecord {
    let summary = ResourceSummary::of(template);
    let record = |target_id: Option<&str>, status| DeletionRecord {
        token: template.token.clone(),
        target_id: target_id.map(str::to_string),
        summary: summary.clone(),
        status,
    };

    let Some(id) = target_id else {
        return record(None, DeletionStatus::NotDeployed);
    };
    let handler = match handlers.get(&template.resource_type) {
        Ok(handler) => handler,
        Err(e) => {
            tracing::warn!("Cannot delete {}: {e}", template.token);
            return record(Some(id), DeletionStatus::Unimplemented);
        }
    };

    match handler.delete_resource(id).await {
        Ok(()) => {
            tracing::debug!("Deleted {} ({id})", template.token);
            record(Some(id), DeletionStatus::Deleted)
        }
        Err(e) => {
            let error = SolutionError::HandlerFailed {
                token: template.token.clone(),
                operation: "delete".to_string(),
                reason: format!("{e:#}"),
            };
            tracing::warn!("{error}");
            record(Some(id), DeletionStatus::Failed { error: error.to_string() })
        }
    }
}

/// Delete every deployed template, dependents before dependencies.
///
/// `deployed` maps tokens to the resources a previous deployment created;
/// tokens missing from it are reported as not deployed.
pub async fn delete_all(
    graph: &TemplateGraph,
    order: &BuildOrder,
    handlers: &HandlerRegistry,
    deployed: &TemplateDictionary,
    mode: DeleteMode<'_>,
    options: &DeleteOptions,
) -> DeletionSummary {
    let reversed: Vec<&Template> = order.iter().rev().filter_map(|token| graph.get(token)).collect();
    tracing::info!("Deleting {} template(s)", reversed.len());

    let summary = match mode {
        DeleteMode::Checked(gate) => delete_checked(reversed, handlers, deployed, gate, &options.cancel).await,
        DeleteMode::Unchecked => delete_unchecked(graph, reversed, handlers, deployed, options).await,
    };

    tracing::info!(
        "Deletion finished: {} deleted, {} not deleted",
        summary.deleted.len(),
        summary.not_deleted.len()
    );
    summary
}

fn target(deployed: &TemplateDictionary, template: &Template) -> Option<String> {
    deployed.get(&template.token).map(|r| r.new_id.clone())
}

fn cancel_remaining<'g>(
    summary: &mut DeletionSummary,
    remaining: impl IntoIterator<Item = &'g Template>,
    deployed: &TemplateDictionary,
) {
    if !summary.cancelled {
        tracing::info!("Cancellation requested; no further deletions will start");
        summary.cancelled = true;
    }
    for template in remaining {
        summary.push(kept(template, target(deployed, template), DeletionStatus::Cancelled));
    }
}

async fn delete_checked(
    reversed: Vec<&Template>,
    handlers: &HandlerRegistry,
    deployed: &TemplateDictionary,
    gate: &dyn ConfirmDeletion,
    cancel: &CancellationToken,
) -> DeletionSummary {
    let mut summary = DeletionSummary::default();
    for (index, template) in reversed.iter().copied().enumerate() {
        if cancel.is_cancelled() {
            cancel_remaining(&mut summary, reversed[index..].iter().copied(), deployed);
            break;
        }
        let target_id = target(deployed, template);
        if target_id.is_some() && !gate.confirm(&template.token, &ResourceSummary::of(template)).await {
            tracing::info!("Deletion of {} declined", template.token);
            summary.push(kept(template, target_id, DeletionStatus::Declined));
            continue;
        }
        summary.push(delete_one(handlers, template, target_id.as_deref()).await);
    }
    summary
}

fn start<'g>(
    handlers: &'g HandlerRegistry,
    template: &'g Template,
    target_id: Option<String>,
) -> impl Future<Output = DeletionRecord> + 'g {
    async move { delete_one(handlers, template, target_id.as_deref()).await }
}

async fn delete_unchecked<'g>(
    graph: &'g TemplateGraph,
    reversed: Vec<&'g Template>,
    handlers: &'g HandlerRegistry,
    deployed: &TemplateDictionary,
    options: &DeleteOptions,
) -> DeletionSummary {
    let mut summary = DeletionSummary::default();

    // token -> dependents not yet attempted
    let scheduled: BTreeSet<&str> = reversed.iter().map(|t| t.token.as_str()).collect();
    let dependents = graph.dependents();
    let mut waiting: HashMap<&str, usize> = reversed
        .iter()
        .map(|t| {
            let count = dependents
                .get(t.token.as_str())
                .map_or(0, |list| list.iter().filter(|d| scheduled.contains(**d)).count());
            (t.token.as_str(), count)
        })
        .collect();

    let cap = options.max_parallel.max(1);
    let mut pending = reversed;
    let mut in_flight = FuturesUnordered::new();

    loop {
        if options.cancel.is_cancelled() && !pending.is_empty() {
            cancel_remaining(&mut summary, std::mem::take(&mut pending), deployed);
        }

        let mut index = 0;
        while index < pending.len() && in_flight.len() < cap && !options.cancel.is_cancelled() {
            if waiting.get(pending[index].token.as_str()).copied().unwrap_or(0) > 0 {
                index += 1;
                continue;
            }
            let template = pending.remove(index);
            in_flight.push(start(handlers, template, target(deployed, template)));
        }

        if in_flight.is_empty() {
            if pending.is_empty() {
                break;
            }
            if options.cancel.is_cancelled() {
                continue;
            }
            // only reachable for a cyclic graph; take the next token in reverse order
            tracing::warn!("No deletable token is free of dependents; continuing with {}", pending[0].token);
            let template = pending.remove(0);
            in_flight.push(start(handlers, template, target(deployed, template)));
        }

        let Some(record) = in_flight.next().await else {
            continue;
        };
        if let Some(template) = graph.get(&record.token) {
            let deps: BTreeSet<&str> = template.dependency_tokens.iter().map(String::as_str).collect();
            for dep in deps {
                if let Some(count) = waiting.get_mut(dep) {
                    *count = count.saturating_sub(1);
                }
            }
        }
        summary.push(record);
    }
    summary
}
