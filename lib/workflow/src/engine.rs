//! The workflow engine.
//!
//! `Engine::execute_workflow` walks a workflow depth-first from its trigger:
//! each node runs through the retry wrapper, its result lands in the shared
//! context, and outbound connections are followed in declaration order when
//! their guards hold. A node that fails without continue-on-error unwinds
//! the whole walk. Error-handler nodes run on every terminal failure.
//!
//! The run is always finalised: whatever happens, the returned record has a
//! terminal status, and persisting it is best-effort.

use crate::condition::evaluate_guard;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::definition::Workflow;
use crate::error::{ExecutionError, StoreError, WorkflowError};
use crate::execution::{ExecutionErrorSummary, ExecutionStatus, WorkflowExecution};
use crate::graph::WorkflowGraph;
use crate::handler::HandlerRegistry;
use crate::node::{Node, NodeId};
use crate::retry::{RetryPolicy, attempt, run_with_retry};
use crate::store::{ExecutionStore, Revision};
use futures::future::BoxFuture;
use rootcause::prelude::Report;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use switchyard_core::ExecutionId;
use tracing::{debug, error, info, instrument, warn};

/// State of one walk. Owned by a single `execute_workflow` call.
struct Run<'w> {
    workflow: &'w Workflow,
    graph: WorkflowGraph<'w>,
    execution: WorkflowExecution,
    context: ExecutionContext,
    /// Nodes from the trigger to the one currently executing.
    path: Vec<NodeId>,
    /// Whether the record exists in the store, so cancellation can be observed.
    persisted: bool,
}

/// Executes workflows against a handler registry and an execution store.
///
/// The engine is shared across concurrent runs; runs share nothing but the
/// registry and the store.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<HandlerRegistry>,
    store: Arc<dyn ExecutionStore>,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with the default configuration.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>, store: Arc<dyn ExecutionStore>) -> Self {
        Self {
            registry,
            store,
            config: EngineConfig::default(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the execution store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    /// Runs a workflow to completion and returns its record.
    ///
    /// Never fails: invalid workflows, node failures, cancellation and
    /// storage problems all end up in the returned record.
    #[instrument(
        skip(self, workflow, input),
        fields(workflow_id = %workflow.id, execution_id = tracing::field::Empty)
    )]
    pub async fn execute_workflow(
        &self,
        workflow: &Workflow,
        input: Option<JsonValue>,
    ) -> WorkflowExecution {
        let mut execution = WorkflowExecution::new(workflow);
        tracing::Span::current().record("execution_id", tracing::field::display(execution.id));

        if let Err(e) = execution.start() {
            warn!(error = %e, "Unexpected state for new execution");
        }
        info!(workflow_name = %workflow.name, "Workflow execution started");
        execution.info(
            format!(
                "Execution started for workflow {} (version {})",
                workflow.name, workflow.version
            ),
            None,
        );

        let revision = match self.store.create(&execution).await {
            Ok(revision) => Some(revision),
            Err(e) => {
                warn!(error = %e, "Failed to create execution record");
                execution.warn(format!("Failed to persist execution record: {e}"), None);
                None
            }
        };

        let context = ExecutionContext::new(input.unwrap_or(JsonValue::Null));
        let (mut execution, outcome) = match WorkflowGraph::build(workflow) {
            Ok(graph) => {
                let mut run = Run {
                    workflow,
                    graph,
                    execution,
                    context,
                    path: Vec::new(),
                    persisted: revision.is_some(),
                };
                self.preflight(&mut run);
                let trigger = workflow.trigger.clone();
                let outcome = self.walk(&mut run, trigger, 0).await;
                (run.execution, outcome)
            }
            Err(e) => (
                execution,
                Err(ExecutionError::InvalidWorkflow {
                    reason: e.to_string(),
                }),
            ),
        };

        self.finish(&mut execution, outcome);
        self.persist_final(&mut execution, revision).await;
        execution
    }

    /// Flips a stored execution to cancelled.
    ///
    /// A run in progress notices before its next node and stops; handler
    /// calls already in flight are not interrupted.
    ///
    /// # Errors
    ///
    /// Fails if the record cannot be loaded or saved, or is already terminal.
    #[instrument(skip(self), fields(execution_id = %id))]
    pub async fn cancel(&self, id: ExecutionId) -> Result<WorkflowExecution, Report<WorkflowError>> {
        let (mut execution, revision) = self.store.load(id).await.map_err(|e| {
            Report::new(e).context(WorkflowError::Cancellation { execution_id: id })
        })?;

        execution.cancel().map_err(|e| {
            Report::new(e).context(WorkflowError::Cancellation { execution_id: id })
        })?;
        execution.warn("Execution cancelled", None);

        self.store.save(&execution, revision).await.map_err(|e| {
            Report::new(e).context(WorkflowError::Cancellation { execution_id: id })
        })?;
        info!("Execution cancelled");
        Ok(execution)
    }

    /// Logs structural oddities that do not stop the run.
    fn preflight(&self, run: &mut Run<'_>) {
        let workflow = run.workflow;
        if !workflow.is_active() {
            debug!(status = %workflow.status, "Running workflow that is not active");
            run.execution.warn(
                format!("Workflow status is {}; running anyway", workflow.status),
                None,
            );
        }

        if run.graph.is_cyclic() {
            warn!(max_depth = self.config.max_depth, "Workflow graph contains a cycle");
            run.execution.warn(
                format!(
                    "Workflow graph contains a cycle; walk depth is limited to {}",
                    self.config.max_depth
                ),
                None,
            );
        }

        let unreachable: Vec<&str> = run
            .graph
            .unreachable_from_trigger()
            .into_iter()
            .map(NodeId::as_str)
            .collect();
        if !unreachable.is_empty() {
            warn!(nodes = ?unreachable, "Nodes unreachable from trigger");
            run.execution.warn(
                format!("Nodes unreachable from trigger: {}", unreachable.join(", ")),
                None,
            );
        }
    }

    fn walk<'a, 'w: 'a>(
        &'a self,
        run: &'a mut Run<'w>,
        node_id: NodeId,
        depth: usize,
    ) -> BoxFuture<'a, Result<(), ExecutionError>> {
        Box::pin(async move {
            if depth > self.config.max_depth {
                return Err(ExecutionError::DepthExceeded {
                    node_id,
                    max_depth: self.config.max_depth,
                });
            }

            if self.cancel_requested(run).await {
                return Err(ExecutionError::Cancelled);
            }

            let Some(node) = run.graph.node(node_id.as_str()) else {
                return Err(ExecutionError::InvalidWorkflow {
                    reason: format!("node {node_id} is not part of the workflow"),
                });
            };

            run.path.push(node.id.clone());
            self.run_node(run, node).await?;

            for conn in run.graph.outgoing(node.id.as_str()) {
                if let Some(guard) = &conn.condition
                    && !evaluate_guard(guard, &run.context)
                {
                    debug!(from = %conn.from, to = %conn.to, "Connection guard not met");
                    run.execution.info(
                        format!(
                            "Skipped {} -> {}: condition not met ({guard})",
                            conn.from, conn.to
                        ),
                        Some(&conn.to),
                    );
                    continue;
                }
                self.walk(run, conn.to.clone(), depth + 1).await?;
            }

            run.path.pop();
            Ok(())
        })
    }

    /// Executes one node and applies the continue-or-abort decision.
    async fn run_node(&self, run: &mut Run<'_>, node: &Node) -> Result<(), ExecutionError> {
        let policy = RetryPolicy::for_node(node, &self.config);
        if node.execution.as_ref().is_some_and(|e| e.parallel) {
            debug!(node_id = %node.id, "Parallel hint ignored; successors run sequentially");
        }

        debug!(node_id = %node.id, node_type = %node.node_type(), "Executing node");
        run.execution.info(
            format!("Executing node {} ({})", node.name, node.node_type()),
            Some(&node.id),
        );

        match run_with_retry(
            &self.registry,
            node,
            &run.context,
            &policy,
            &mut run.execution,
        )
        .await
        {
            Ok(result) => {
                run.context.set_result(node.id.as_str(), result);
                run.execution
                    .info(format!("Node {} completed", node.name), Some(&node.id));
                Ok(())
            }
            Err(failure) => {
                let message = failure.error.to_string();
                if policy.continue_on_error {
                    run.context.record_failure(node, &message);
                    self.dispatch_error_handlers(run, node, &message).await;
                    run.execution.warn(
                        format!("Continuing after failure of node {}", node.name),
                        Some(&node.id),
                    );
                    return Ok(());
                }

                self.dispatch_error_handlers(run, node, &message).await;
                Err(ExecutionError::NodeFailed {
                    node_id: node.id.clone(),
                    node_name: node.name.clone(),
                    attempts: failure.attempts,
                    reason: message,
                    path: run.path.clone(),
                })
            }
        }
    }

    /// Runs every error-handler node once for a terminal node failure.
    ///
    /// Handler failures are logged and swallowed.
    async fn dispatch_error_handlers(&self, run: &mut Run<'_>, failed: &Node, message: &str) {
        let workflow = run.workflow;
        let handlers: Vec<&Node> = workflow
            .error_handlers()
            .filter(|h| h.id != failed.id)
            .collect();
        if handlers.is_empty() {
            return;
        }

        let context =
            run.context
                .for_error_handler(failed, message, workflow.id, run.execution.id);
        for handler in handlers {
            info!(handler = %handler.id, failed_node = %failed.id, "Dispatching error handler");
            run.execution.info(
                format!(
                    "Running error handler {} for failed node {}",
                    handler.name, failed.name
                ),
                Some(&handler.id),
            );

            let timeout = RetryPolicy::for_node(handler, &self.config).timeout;
            match attempt(&self.registry, handler, &context, timeout).await {
                Ok(_) => run.execution.info(
                    format!("Error handler {} completed", handler.name),
                    Some(&handler.id),
                ),
                Err(e) => {
                    warn!(handler = %handler.id, error = %e, "Error handler failed");
                    run.execution.warn(
                        format!("Error handler {} failed: {e}", handler.name),
                        Some(&handler.id),
                    );
                }
            }
        }
    }

    /// Returns whether the stored record has been cancelled externally.
    async fn cancel_requested(&self, run: &Run<'_>) -> bool {
        if !self.config.check_cancellation || !run.persisted {
            return false;
        }
        match self.store.load(run.execution.id).await {
            Ok((stored, _)) => stored.status == ExecutionStatus::Cancelled,
            Err(e) => {
                debug!(error = %e, "Could not read execution record for cancellation check");
                false
            }
        }
    }

    /// Moves the record to its terminal status and appends the summary line.
    fn finish(&self, execution: &mut WorkflowExecution, outcome: Result<(), ExecutionError>) {
        let transition = match outcome {
            Ok(()) => execution.transition(ExecutionStatus::Success),
            Err(ExecutionError::Cancelled) => {
                execution.warn("Execution stopped: cancelled externally", None);
                execution.transition(ExecutionStatus::Cancelled)
            }
            Err(e) => {
                let summary = ExecutionErrorSummary {
                    message: e.to_string(),
                    stack: e.stack(),
                };
                error!(error = %e, "Workflow execution failed");
                execution.error(format!("Execution failed: {e}"), None);
                execution.fail(summary)
            }
        };
        if let Err(e) = transition {
            warn!(error = %e, "Could not finalise execution status");
        }

        let duration = execution.duration_ms.unwrap_or(0);
        info!(status = %execution.status, duration_ms = duration, "Workflow execution finished");
        execution.info(
            format!(
                "Execution finished with status {} in {duration}ms",
                execution.status
            ),
            None,
        );
    }

    /// Writes the final record. Failures are logged, never raised.
    async fn persist_final(&self, execution: &mut WorkflowExecution, revision: Option<Revision>) {
        let written = match revision {
            Some(revision) => self.store.save(execution, revision).await,
            None => self.store.create(execution).await,
        };

        match written {
            Ok(_) => {}
            Err(StoreError::Conflict { .. }) => self.resolve_conflict(execution).await,
            Err(e) => record_persist_failure(execution, &e),
        }
    }

    /// Reloads after a revision conflict and retries the write once.
    ///
    /// A terminal status already in the store wins over ours, along with
    /// its error summary.
    async fn resolve_conflict(&self, execution: &mut WorkflowExecution) {
        let (stored, revision) = match self.store.load(execution.id).await {
            Ok(found) => found,
            Err(e) => {
                record_persist_failure(execution, &e);
                return;
            }
        };

        if stored.status.is_terminal() && stored.status != execution.status {
            debug!(stored = %stored.status, ours = %execution.status, "Keeping stored terminal status");
            execution.warn(
                format!(
                    "Execution was marked {} externally; keeping that status",
                    stored.status
                ),
                None,
            );
            execution.status = stored.status;
            execution.error = stored.error;
        }

        if let Err(e) = self.store.save(execution, revision).await {
            record_persist_failure(execution, &e);
        }
    }
}

fn record_persist_failure(execution: &mut WorkflowExecution, e: &StoreError) {
    error!(error = %e, "Failed to persist execution record");
    execution.error(format!("Failed to persist execution record: {e}"), None);
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
