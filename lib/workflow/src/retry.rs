//! Per-node retry and timeout wrapper.
//!
//! Each attempt looks up the node's handler and races it against the
//! attempt timeout. Failed attempts are spaced by a fixed delay. The
//! wrapper only reports the outcome; deciding whether the run continues is
//! the walker's job.

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::NodeError;
use crate::execution::WorkflowExecution;
use crate::handler::HandlerRegistry;
use crate::node::Node;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{error, warn};

/// Resolved retry/timeout policy for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub continue_on_error: bool,
}

impl RetryPolicy {
    /// Merges the node's execution config over the engine defaults.
    #[must_use]
    pub fn for_node(node: &Node, config: &EngineConfig) -> Self {
        let exec = node.execution.as_ref();
        Self {
            retries: exec.map_or(0, |e| e.retries),
            retry_delay: exec
                .and_then(|e| e.retry_delay_ms)
                .map_or_else(|| config.default_retry_delay(), Duration::from_millis),
            timeout: exec
                .and_then(|e| e.timeout_ms)
                .map_or_else(|| config.default_timeout(), Duration::from_millis),
            continue_on_error: exec.is_some_and(|e| e.continue_on_error),
        }
    }

    /// Total attempts allowed.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// A node that exhausted its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    /// The error from the last attempt.
    pub error: NodeError,
    pub attempts: u32,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Runs one handler attempt with the timeout as a backstop.
pub(crate) async fn attempt(
    registry: &HandlerRegistry,
    node: &Node,
    context: &ExecutionContext,
    timeout: Duration,
) -> Result<JsonValue, NodeError> {
    let handler = registry.get(node.node_type())?;
    match tokio::time::timeout(timeout, handler.execute(node, context)).await {
        Ok(result) => result,
        Err(_) => Err(NodeError::Timeout {
            timeout_ms: millis(timeout),
        }),
    }
}

/// Runs a node under its policy, logging each failed attempt to the record.
///
/// Every failed attempt appends exactly one `warn` line; exhausting the
/// attempts appends one `error` line naming the attempt count.
///
/// # Errors
///
/// Returns the last attempt's error once all attempts have failed.
pub async fn run_with_retry(
    registry: &HandlerRegistry,
    node: &Node,
    context: &ExecutionContext,
    policy: &RetryPolicy,
    execution: &mut WorkflowExecution,
) -> Result<JsonValue, NodeFailure> {
    let max_attempts = policy.max_attempts();
    let mut attempt_no = 0;

    loop {
        attempt_no += 1;
        let err = match attempt(registry, node, context, policy.timeout).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if attempt_no < max_attempts {
            let delay_ms = millis(policy.retry_delay);
            warn!(
                node_id = %node.id,
                attempt = attempt_no,
                max_attempts,
                retry_delay_ms = delay_ms,
                error = %err,
                "Node attempt failed, retrying"
            );
            execution.warn(
                format!(
                    "Node {} attempt {attempt_no}/{max_attempts} failed: {err}; retrying in {delay_ms}ms",
                    node.name
                ),
                Some(&node.id),
            );
            tokio::time::sleep(policy.retry_delay).await;
            continue;
        }

        warn!(
            node_id = %node.id,
            attempt = attempt_no,
            max_attempts,
            error = %err,
            "Node attempt failed"
        );
        execution.warn(
            format!(
                "Node {} attempt {attempt_no}/{max_attempts} failed: {err}",
                node.name
            ),
            Some(&node.id),
        );
        error!(node_id = %node.id, attempts = attempt_no, error = %err, "Node failed");
        execution.error(
            format!(
                "Node {} failed after {attempt_no} attempt(s): {err}",
                node.name
            ),
            Some(&node.id),
        );
        return Err(NodeFailure {
            error: err,
            attempts: attempt_no,
        });
    }
}
