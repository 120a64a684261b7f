//! Runner commands.
//!
//! Each command returns a serializable value for `main` to print, or a
//! `Report<CliError>` naming what the runner was doing.

use crate::config::CliConfig;
use crate::error::CliError;
use rootcause::prelude::Report;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use switchyard_ai::FailoverChain;
use switchyard_core::ExecutionId;
use switchyard_integration::{
    ChatWebhookConnector, ConnectorRegistry, ConsoleConnector, builtin_registry,
};
use switchyard_workflow::{
    Engine, ExecutionStore, FileExecutionStore, Workflow, WorkflowExecution, WorkflowGraph,
};
use tracing::{debug, info};

/// Where the run input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// No input; the run starts with a null payload.
    None,
    /// JSON given on the command line.
    Inline(String),
    /// JSON read from a file.
    File(PathBuf),
}

/// Structural summary printed by `validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub workflow: String,
    pub nodes: usize,
    pub connections: usize,
    pub cyclic: bool,
    /// Non-handler nodes no path from the trigger reaches.
    pub unreachable: Vec<String>,
}

/// Engine and store wired from configuration.
pub struct Runner {
    engine: Engine,
    store: Arc<dyn ExecutionStore>,
}

impl Runner {
    /// Builds the engine with every built-in handler and connector.
    #[must_use]
    pub fn from_config(config: &CliConfig) -> Self {
        let store: Arc<dyn ExecutionStore> =
            Arc::new(FileExecutionStore::new(config.store_dir.clone()));

        let connectors = ConnectorRegistry::new()
            .with(Arc::new(ConsoleConnector::new()))
            .with(Arc::new(ChatWebhookConnector::new()));
        let generation = FailoverChain::from_config(&config.ai);
        if generation.is_empty() {
            debug!("No generation backends configured; ai_generate nodes will fail");
        }

        let registry = builtin_registry(Arc::new(connectors), Arc::new(generation));
        let engine = Engine::new(Arc::new(registry), store.clone()).with_config(config.engine.clone());
        Self { engine, store }
    }

    /// Runs a workflow file to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the workflow or input cannot be loaded. A run
    /// that fails is not an error here; check the record's status.
    pub async fn run(
        &self,
        workflow_path: &Path,
        input: &InputSource,
    ) -> Result<WorkflowExecution, Report<CliError>> {
        let workflow = load_workflow(workflow_path).await?;
        let input = read_input(input).await?;
        info!(workflow = %workflow.name, "Running workflow");
        Ok(self.engine.execute_workflow(&workflow, input).await)
    }

    /// Checks a workflow file without running it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the graph is malformed.
    pub async fn validate(&self, workflow_path: &Path) -> Result<ValidationReport, Report<CliError>> {
        let workflow = load_workflow(workflow_path).await?;
        let graph = WorkflowGraph::build(&workflow).map_err(|e| {
            Report::new(e).context(CliError::InvalidWorkflow {
                path: workflow_path.to_path_buf(),
            })
        })?;

        Ok(ValidationReport {
            workflow: workflow.name.clone(),
            nodes: graph.node_count(),
            connections: workflow.connections.len(),
            cyclic: graph.is_cyclic(),
            unreachable: graph
                .unreachable_from_trigger()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        })
    }

    /// Loads a stored execution record.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is malformed or no record exists.
    pub async fn show(&self, id: &str) -> Result<WorkflowExecution, Report<CliError>> {
        let execution_id = parse_execution_id(id)?;
        let (execution, _) = self.store.load(execution_id).await.map_err(|e| {
            Report::new(e).context(CliError::LoadExecution { id: id.to_string() })
        })?;
        Ok(execution)
    }

    /// Requests cancellation of a running execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is malformed, no record exists, or the
    /// execution already finished.
    pub async fn cancel(&self, id: &str) -> Result<WorkflowExecution, Report<CliError>> {
        let execution_id = parse_execution_id(id)?;
        self.engine
            .cancel(execution_id)
            .await
            .map_err(|e| e.context(CliError::Cancel { id: id.to_string() }))
    }
}

fn parse_execution_id(id: &str) -> Result<ExecutionId, Report<CliError>> {
    id.parse::<ExecutionId>().map_err(|e| {
        Report::new(e).context(CliError::ParseExecutionId { id: id.to_string() })
    })
}

async fn read_file(path: &Path) -> Result<String, Report<CliError>> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        Report::new(e).context(CliError::ReadFile {
            path: path.to_path_buf(),
        })
    })
}

/// Reads and parses a workflow definition.
///
/// # Errors
///
/// Returns an error if the file is unreadable, malformed or structurally invalid.
pub async fn load_workflow(path: &Path) -> Result<Workflow, Report<CliError>> {
    let json = read_file(path).await?;
    Workflow::from_json(&json).map_err(|e| {
        e.context(CliError::LoadWorkflow {
            path: path.to_path_buf(),
        })
    })
}

/// Reads the run input.
///
/// # Errors
///
/// Returns an error if the file is unreadable or the text is not JSON.
pub async fn read_input(source: &InputSource) -> Result<Option<JsonValue>, Report<CliError>> {
    let (text, origin) = match source {
        InputSource::None => return Ok(None),
        InputSource::Inline(text) => (text.clone(), "--input".to_string()),
        InputSource::File(path) => (read_file(path).await?, path.display().to_string()),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| Report::new(e).context(CliError::ParseInput { origin }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use switchyard_workflow::ExecutionStatus;
    use tempfile::TempDir;

    const ORDER_FLOW: &str = r#"{
        "name": "Order confirmation",
        "status": "active",
        "trigger": "start",
        "nodes": [
            {"id": "start", "name": "Start", "config": {"type": "manual"}},
            {"id": "vars", "name": "Vars", "config": {"type": "set_variables", "values": {"total": "{{input.total}}"}}},
            {"id": "big", "name": "Big order", "config": {"type": "log", "level": "info", "message": "Big order {{input.id}}"}},
            {"id": "notify", "name": "Notify", "config": {"type": "integration", "connector": "console", "operation": "send_sms", "parameters": {"text": "Order {{input.id}} confirmed"}}}
        ],
        "connections": [
            {"from": "start", "to": "vars"},
            {"from": "vars", "to": "big", "condition": "input.total > 100"},
            {"from": "vars", "to": "notify"}
        ]
    }"#;

    fn runner(dir: &TempDir) -> Runner {
        let config = CliConfig {
            store_dir: dir.path().join("executions"),
            ..CliConfig::default()
        };
        Runner::from_config(&config)
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).expect("write file");
        path
    }

    #[tokio::test]
    async fn run_then_show() {
        let dir = tempfile::tempdir().expect("temp dir");
        let runner = runner(&dir);
        let workflow = write(&dir, "order.json", ORDER_FLOW);

        let execution = runner
            .run(
                &workflow,
                &InputSource::Inline(r#"{"id": "A-1", "total": 250}"#.to_string()),
            )
            .await
            .expect("run");
        assert_eq!(execution.status, ExecutionStatus::Success);

        let shown = runner.show(&execution.id.to_string()).await.expect("show");
        assert_eq!(shown.id, execution.id);
        assert_eq!(shown.status, ExecutionStatus::Success);
        assert_eq!(shown.logs.len(), execution.logs.len());
    }

    #[tokio::test]
    async fn cancelling_a_finished_run_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let runner = runner(&dir);
        let workflow = write(&dir, "order.json", ORDER_FLOW);

        let execution = runner
            .run(&workflow, &InputSource::None)
            .await
            .expect("run");
        let err = runner.cancel(&execution.id.to_string()).await.unwrap_err();
        assert!(err.to_string().contains("failed to cancel execution"));
    }

    #[tokio::test]
    async fn validate_reports_structure() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workflow = write(&dir, "order.json", ORDER_FLOW);

        let report = runner(&dir).validate(&workflow).await.expect("validate");
        assert_eq!(
            report,
            ValidationReport {
                workflow: "Order confirmation".to_string(),
                nodes: 4,
                connections: 3,
                cyclic: false,
                unreachable: Vec::new(),
            }
        );
    }

    #[tokio::test]
    async fn validate_rejects_dangling_connection() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workflow = write(
            &dir,
            "broken.json",
            r#"{
                "name": "Broken",
                "trigger": "start",
                "nodes": [{"id": "start", "name": "Start", "config": {"type": "manual"}}],
                "connections": [{"from": "start", "to": "ghost"}]
            }"#,
        );

        let err = runner(&dir).validate(&workflow).await.unwrap_err();
        assert!(err.to_string().contains("failed to load workflow"));
    }

    #[tokio::test]
    async fn show_rejects_malformed_id() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = runner(&dir).show("not-an-id").await.unwrap_err();
        assert!(err.to_string().contains("'not-an-id' is not an execution id"));
    }

    #[tokio::test]
    async fn input_sources() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(&dir, "input.json", r#"{"id": "A-2"}"#);

        assert_eq!(read_input(&InputSource::None).await.expect("none"), None);
        assert_eq!(
            read_input(&InputSource::File(path)).await.expect("file"),
            Some(serde_json::json!({"id": "A-2"}))
        );

        let err = read_input(&InputSource::Inline("{oops".to_string()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("input from --input is not valid JSON"));
    }
}
