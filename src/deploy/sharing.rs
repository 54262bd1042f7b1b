//! Group sharing after every creation is terminal.
//!
//! Each share is an independent call, so they all run at once. Group tokens
//! resolve through the run's dictionary; a group token that was not part of
//! the graph names a group that already exists and is used as-is.
//!
//! A tracking view shares into its own tracking group as the tracking owner
//! and into every other group as the acting user, so the tracking group is
//! always a call of its own.

use futures::future::join_all;

use super::DeployContext;
use super::records::{DeploymentRecord, ShareRecord};
use crate::handlers::GroupSharing;
use crate::template::TemplateGraph;
use crate::tokens::TemplateDictionary;

struct PlannedShare<'a> {
    token: &'a str,
    resource_id: &'a str,
    group_token: &'a str,
    group_id: Option<String>,
    identity: Option<&'a str>,
}

fn plan<'a>(
    graph: &'a TemplateGraph,
    records: &'a [DeploymentRecord],
    dictionary: &'a TemplateDictionary,
    context: &'a DeployContext,
) -> Vec<PlannedShare<'a>> {
    let mut planned = Vec::new();
    for record in records.iter().filter(|r| r.is_succeeded()) {
        let (Some(template), Some(resource_id)) = (graph.get(&record.token), record.new_id.as_deref())
        else {
            continue;
        };

        for group_token in &template.group_tokens {
            let group_id = match dictionary.get(group_token) {
                Some(resolved) => Some(resolved.new_id.clone()),
                // part of the graph but never created
                None if graph.contains(group_token) => None,
                None => Some(group_token.clone()),
            };

            let identity = if template.tracking_group_token.as_deref() == Some(group_token.as_str()) {
                if context.tracking_owner.is_none() {
                    tracing::warn!("No tracking owner configured; sharing {} as the acting user", record.token);
                }
                context.tracking_owner.as_deref()
            } else {
                None
            };

            planned.push(PlannedShare {
                token: &record.token,
                resource_id,
                group_token,
                group_id,
                identity,
            });
        }
    }
    planned
}

/// Share every created resource into its groups.
pub(super) async fn share_deployed(
    graph: &TemplateGraph,
    records: &[DeploymentRecord],
    dictionary: &TemplateDictionary,
    sharing: &dyn GroupSharing,
    context: &DeployContext,
) -> Vec<ShareRecord> {
    let planned = plan(graph, records, dictionary, context);
    if planned.is_empty() {
        return Vec::new();
    }
    tracing::info!("Sharing into groups ({} share(s))", planned.len());

    let calls = planned.into_iter().map(|share| async move {
        let error = match &share.group_id {
            None => Some(format!("group {} was not deployed", share.group_token)),
            Some(group_id) => sharing
                .share_to_group(share.resource_id, group_id, share.identity)
                .await
                .err()
                .map(|e| format!("{e:#}")),
        };
        if let Some(error) = &error {
            tracing::warn!("Failed to share {} into {}: {error}", share.token, share.group_token);
        } else {
            tracing::debug!("Shared {} into {}", share.token, share.group_token);
        }
        ShareRecord {
            token: share.token.to_string(),
            group_token: share.group_token.to_string(),
            group_id: share.group_id,
            acting_identity: share.identity.map(str::to_string),
            error,
        }
    });

    join_all(calls).await
}
