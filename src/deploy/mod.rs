//! Deployment orchestrator.
//!
//! Templates are created in build order, with as many creations in flight as
//! their dependencies allow. A template is dispatched only once every
//! dependency inside the graph is terminal:
//!
//! - all dependencies succeeded: its placeholders are substituted from the
//!   dictionary and the type handler is called
//! - some dependency failed or was skipped: it is skipped as blocked by it
//! - no handler exists for its type: it is skipped with a warning
//!
//! The scheduling loop is the only writer of the [`TemplateDictionary`] and
//! the progress accumulator. Handler calls run as futures polled by the loop,
//! so a slow creation never holds back an eligible sibling.
//!
//! Cancellation is cooperative. Once the token is observed no new template
//! starts; in-flight creations finish and their results are kept.

mod records;
mod sharing;

pub use records::{DeploymentRecord, DeploymentStatus, DeploymentSummary, ShareRecord, SkipReason};

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::constants::DEFAULT_MAX_PARALLEL;
use crate::core::{Result, SolutionError};
use crate::handlers::{CreatedResource, GroupSharing, HandlerRegistry, TypeHandler};
use crate::resolver::{BuildOrder, sort};
use crate::template::{MaterializedTemplate, Template, TemplateGraph};
use crate::tokens::{ResolutionRecord, RunContext, TemplateDictionary};
use crate::utils::progress::{ProgressSink, WeightedProgress};

/// Run-wide values handed to every type handler.
#[derive(Debug, Clone, Default)]
pub struct DeployContext {
    /// Values behind the special tokens
    pub run: RunContext,
    /// Identity that owns tracking views in the destination
    pub tracking_owner: Option<String>,
    /// Destination folder for created resources
    pub folder_id: Option<String>,
}

impl DeployContext {
    /// A context with the given run-wide values.
    #[must_use]
    pub fn new(run: RunContext) -> Self {
        Self {
            run,
            ..Self::default()
        }
    }

    /// Set the tracking owner.
    #[must_use]
    pub fn with_tracking_owner(mut self, owner: impl Into<String>) -> Self {
        self.tracking_owner = Some(owner.into());
        self
    }
}

/// Scheduling options for a deployment run.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Creations in flight at once
    pub max_parallel: usize,
    /// Cooperative cancellation signal
    pub cancel: CancellationToken,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            cancel: CancellationToken::new(),
        }
    }
}

/// Mutable state of one run, owned by the scheduling loop.
struct Run<'p> {
    // token -> succeeded, for terminal tokens only
    terminal: HashMap<String, bool>,
    records: HashMap<String, DeploymentRecord>,
    dictionary: TemplateDictionary,
    log: Vec<String>,
    progress: WeightedProgress,
    sink: &'p mut dyn ProgressSink,
    cancelled: bool,
}

impl Run<'_> {
    fn is_terminal(&self, token: &str) -> bool {
        self.terminal.contains_key(token)
    }

    fn succeeded(&self, token: &str) -> bool {
        self.terminal.get(token).copied().unwrap_or(false)
    }

    fn finish(&mut self, template: &Template, new_id: Option<String>, status: DeploymentStatus) {
        let line = match &status {
            DeploymentStatus::Succeeded => format!(
                "Created {} ({}) as {}",
                template.token,
                template.resource_type,
                new_id.as_deref().unwrap_or_default()
            ),
            DeploymentStatus::Failed { error } => format!("Failed {}: {error}", template.token),
            DeploymentStatus::Skipped { reason } => format!("Skipped {}: {reason}", template.token),
        };
        self.log.push(line);

        self.terminal.insert(template.token.clone(), matches!(status, DeploymentStatus::Succeeded));
        self.records.insert(
            template.token.clone(),
            DeploymentRecord {
                token: template.token.clone(),
                resource_type: template.resource_type.clone(),
                new_id,
                status,
            },
        );

        if let Some(percent) = self.progress.advance(u64::from(template.cost_weight)) {
            self.sink.report(percent);
        }
    }

    fn fail(&mut self, template: &Template, error: &SolutionError) {
        self.finish(
            template,
            None,
            DeploymentStatus::Failed {
                error: error.to_string(),
            },
        );
    }

    fn skip(&mut self, template: &Template, reason: SkipReason) {
        tracing::warn!("Skipping {}: {reason}", template.token);
        self.finish(template, None, DeploymentStatus::Skipped { reason });
    }
}

fn create<'a>(
    handler: Arc<dyn TypeHandler>,
    template: MaterializedTemplate,
    context: &'a DeployContext,
) -> impl Future<Output = (String, anyhow::Result<CreatedResource>)> + Send + 'a {
    async move {
        let result = handler.create_from_template(&template, context).await;
        (template.token, result)
    }
}

/// Sort `graph` and deploy it.
///
/// A graph that is not acyclic is rejected before anything is created.
pub async fn deploy_graph(
    graph: &TemplateGraph,
    handlers: &HandlerRegistry,
    sharing: &dyn GroupSharing,
    context: &DeployContext,
    options: &DeployOptions,
    progress: &mut dyn ProgressSink,
) -> Result<DeploymentSummary> {
    graph.validate()?;
    let order = sort(graph)?;
    Ok(deploy(graph, &order, handlers, sharing, context, options, progress).await)
}

/// Deploy `graph` in `order`.
///
/// Always completes with a summary: per-token failures are recorded and the
/// run moves on to every template whose dependencies succeeded.
pub async fn deploy(
    graph: &TemplateGraph,
    order: &BuildOrder,
    handlers: &HandlerRegistry,
    sharing: &dyn GroupSharing,
    context: &DeployContext,
    options: &DeployOptions,
    progress: &mut dyn ProgressSink,
) -> DeploymentSummary {
    let mut pending: Vec<&Template> = Vec::with_capacity(order.len());
    for token in order.iter() {
        match graph.get(token) {
            Some(template) => pending.push(template),
            None => tracing::warn!("Build order names {token}, which is not in the graph"),
        }
    }

    let total = pending.iter().map(|t| u64::from(t.cost_weight)).sum();
    let mut run = Run {
        terminal: HashMap::new(),
        records: HashMap::new(),
        dictionary: TemplateDictionary::new(),
        log: Vec::new(),
        progress: WeightedProgress::new(total),
        sink: progress,
        cancelled: false,
    };
    let start = run.progress.start();
    run.sink.report(start);
    tracing::info!("Deploying {} template(s)", pending.len());

    let cap = options.max_parallel.max(1);
    let mut in_flight = FuturesUnordered::new();

    loop {
        if !run.cancelled && options.cancel.is_cancelled() {
            tracing::info!("Cancellation requested; no further templates will start");
            run.cancelled = true;
        }

        let mut index = 0;
        while index < pending.len() {
            let template = pending[index];
            let in_graph = || template.dependency_tokens.iter().filter(|dep| graph.contains(dep));

            if in_graph().any(|dep| !run.is_terminal(dep)) {
                index += 1;
                continue;
            }
            if run.cancelled {
                pending.remove(index);
                run.skip(template, SkipReason::Cancelled);
                continue;
            }
            if let Some(blocker) = in_graph().find(|dep| !run.succeeded(dep)) {
                pending.remove(index);
                run.skip(template, SkipReason::BlockedBy { token: blocker.clone() });
                continue;
            }
            let handler = match handlers.get(&template.resource_type) {
                Ok(handler) => handler,
                Err(_) => {
                    pending.remove(index);
                    run.skip(
                        template,
                        SkipReason::UnimplementedType {
                            resource_type: template.resource_type.to_string(),
                        },
                    );
                    continue;
                }
            };
            if in_flight.len() >= cap {
                index += 1;
                continue;
            }

            pending.remove(index);
            match template.materialize(&run.dictionary, &context.run) {
                Ok(materialized) => {
                    tracing::debug!("Creating {} ({})", template.token, template.resource_type);
                    in_flight.push(create(handler, materialized, context));
                }
                Err(e) => {
                    // unreachable with a correct build order
                    let violation = SolutionError::InvariantViolation {
                        message: format!("{} could not be substituted: {e}", template.token),
                    };
                    tracing::error!("{violation}");
                    run.fail(template, &violation);
                }
            }
        }

        if in_flight.is_empty() {
            if !pending.is_empty() {
                for template in std::mem::take(&mut pending) {
                    let violation = SolutionError::InvariantViolation {
                        message: format!("dependencies of {} never became terminal", template.token),
                    };
                    tracing::error!("{violation}");
                    run.fail(template, &violation);
                }
            }
            break;
        }

        let Some((token, result)) = in_flight.next().await else {
            continue;
        };
        let Some(template) = graph.get(&token) else {
            continue;
        };
        match result {
            Ok(created) => {
                let record = ResolutionRecord::from(created);
                let new_id = record.new_id.clone();
                tracing::info!("Created {token} as {new_id}");
                if !run.dictionary.resolve(token.clone(), record) {
                    tracing::error!("Token {token} was resolved twice; keeping the first resolution");
                }
                run.finish(template, Some(new_id), DeploymentStatus::Succeeded);
            }
            Err(e) => {
                let error = SolutionError::HandlerFailed {
                    token: token.clone(),
                    operation: "create".to_string(),
                    reason: format!("{e:#}"),
                };
                tracing::warn!("{error}");
                run.fail(template, &error);
            }
        }
    }

    if !run.cancelled {
        let done = run.progress.finish();
        run.sink.report(done);
    }

    let records: Vec<DeploymentRecord> =
        order.iter().filter_map(|token| run.records.remove(token)).collect();

    let shares = if run.cancelled {
        Vec::new()
    } else {
        sharing::share_deployed(graph, &records, &run.dictionary, sharing, context).await
    };

    let summary = DeploymentSummary {
        records,
        shares,
        dictionary: run.dictionary,
        log: run.log,
        cancelled: run.cancelled,
    };
    tracing::info!(
        "Deployment finished: {} succeeded, {} failed, {} skipped",
        summary.succeeded().len(),
        summary.failed().len(),
        summary.skipped().len()
    );
    summary
}
