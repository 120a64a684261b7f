//! Execution records.
//!
//! A `WorkflowExecution` is the durable, inspectable record of one run:
//! - Overall status with one-directional transitions
//! - Timing (start, completion, duration)
//! - A failure summary with the walk path
//! - An append-only audit log

use crate::definition::Workflow;
use crate::error::WorkflowError;
use crate::node::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use switchyard_core::{ExecutionId, WorkflowId};

/// The overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Record created, walk not started.
    Pending,
    /// Walk in progress.
    Running,
    /// Walk finished without a fatal failure.
    Success,
    /// A node failed without continue-on-error, or the workflow was invalid.
    Failed,
    /// Stopped by an external cancellation.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns true if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Returns whether moving to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Cancelled)
                | (Self::Running, Self::Success | Self::Failed | Self::Cancelled)
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Severity of an execution log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One line of the per-run audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLog {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionErrorSummary {
    pub message: String,
    /// Walk path to the failing node, trigger first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// The persisted record of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub workflow_name: String,
    pub workflow_version: u32,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock run time in milliseconds.
    #[serde(rename = "duration", default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionErrorSummary>,
    #[serde(default)]
    pub logs: Vec<ExecutionLog>,
}

impl WorkflowExecution {
    /// Creates a pending record for a run of `workflow`.
    #[must_use]
    pub fn new(workflow: &Workflow) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id: workflow.id,
            workflow_name: workflow.name.clone(),
            workflow_version: workflow.version,
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            error: None,
            logs: Vec::new(),
        }
    }

    /// Moves to `next`, rejecting transitions the lifecycle does not allow.
    ///
    /// Entering a terminal status stamps `completedAt` and the duration.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::InvalidStateTransition` for disallowed moves.
    pub fn transition(&mut self, next: ExecutionStatus) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(next) {
            return Err(WorkflowError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        if next == ExecutionStatus::Running {
            self.started_at = Utc::now();
        }
        self.status = next;
        if next.is_terminal() {
            let now = Utc::now();
            self.completed_at = Some(now);
            let elapsed = now.signed_duration_since(self.started_at).num_milliseconds();
            self.duration_ms = Some(u64::try_from(elapsed).unwrap_or(0));
        }
        Ok(())
    }

    /// Starts the run.
    ///
    /// # Errors
    ///
    /// Fails unless the record is pending.
    pub fn start(&mut self) -> Result<(), WorkflowError> {
        self.transition(ExecutionStatus::Running)
    }

    /// Marks the run as failed with a summary.
    ///
    /// # Errors
    ///
    /// Fails unless the record is running.
    pub fn fail(&mut self, summary: ExecutionErrorSummary) -> Result<(), WorkflowError> {
        self.transition(ExecutionStatus::Failed)?;
        self.error = Some(summary);
        Ok(())
    }

    /// Marks the run as cancelled.
    ///
    /// # Errors
    ///
    /// Fails if the record is already terminal.
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        self.transition(ExecutionStatus::Cancelled)
    }

    /// Appends a log line.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>, node_id: Option<&NodeId>) {
        self.logs.push(ExecutionLog {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            node_id: node_id.cloned(),
        });
    }

    /// Appends an info line.
    pub fn info(&mut self, message: impl Into<String>, node_id: Option<&NodeId>) {
        self.log(LogLevel::Info, message, node_id);
    }

    /// Appends a warn line.
    pub fn warn(&mut self, message: impl Into<String>, node_id: Option<&NodeId>) {
        self.log(LogLevel::Warn, message, node_id);
    }

    /// Appends an error line.
    pub fn error(&mut self, message: impl Into<String>, node_id: Option<&NodeId>) {
        self.log(LogLevel::Error, message, node_id);
    }

    /// Returns the log lines at `level`.
    pub fn logs_at(&self, level: LogLevel) -> impl Iterator<Item = &ExecutionLog> {
        self.logs.iter().filter(move |l| l.level == level)
    }
}
