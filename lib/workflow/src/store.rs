//! Execution record storage.
//!
//! Records are stored as documents with an optimistic revision. A writer
//! must present the revision it last read; a mismatch is a conflict and the
//! writer has to reload before trying again.
//!
//! Two stores ship with the crate:
//! - `InMemoryExecutionStore` for tests and embedding
//! - `FileExecutionStore`, one JSON document per execution in a directory,
//!   safe to share between processes

use crate::error::StoreError;
use crate::execution::WorkflowExecution;
use async_trait::async_trait;
use fd_lock::RwLock as FileLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use switchyard_core::{ExecutionId, WorkflowId};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Document type tag for execution records.
pub const EXECUTION_DOCUMENT_TYPE: &str = "execution";

/// Optimistic concurrency token for a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// The revision of a freshly created record.
    pub const INITIAL: Self = Self(1);

    /// Returns the revision a successful save produces.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw revision number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable storage for execution records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Stores a new record at `Revision::INITIAL`.
    async fn create(&self, execution: &WorkflowExecution) -> Result<Revision, StoreError>;

    /// Loads a record and its current revision.
    async fn load(&self, id: ExecutionId) -> Result<(WorkflowExecution, Revision), StoreError>;

    /// Replaces a record if its stored revision still equals `expected`.
    ///
    /// Returns the new revision.
    async fn save(
        &self,
        execution: &WorkflowExecution,
        expected: Revision,
    ) -> Result<Revision, StoreError>;

    /// Lists the records of one workflow, oldest first.
    async fn list(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowExecution>, StoreError>;
}

/// The persisted shape: the record plus type tag and revision.
#[derive(Debug, Serialize, Deserialize)]
struct ExecutionDocument {
    #[serde(rename = "type")]
    doc_type: String,
    revision: Revision,
    #[serde(flatten)]
    execution: WorkflowExecution,
}

impl ExecutionDocument {
    fn new(execution: &WorkflowExecution, revision: Revision) -> Self {
        Self {
            doc_type: EXECUTION_DOCUMENT_TYPE.to_string(),
            revision,
            execution: execution.clone(),
        }
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    records: RwLock<HashMap<ExecutionId, (WorkflowExecution, Revision)>>,
}

impl InMemoryExecutionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create(&self, execution: &WorkflowExecution) -> Result<Revision, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&execution.id) {
            return Err(StoreError::AlreadyExists { id: execution.id });
        }
        records.insert(execution.id, (execution.clone(), Revision::INITIAL));
        Ok(Revision::INITIAL)
    }

    async fn load(&self, id: ExecutionId) -> Result<(WorkflowExecution, Revision), StoreError> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    async fn save(
        &self,
        execution: &WorkflowExecution,
        expected: Revision,
    ) -> Result<Revision, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let Some((stored, revision)) = records.get_mut(&execution.id) else {
            return Err(StoreError::NotFound { id: execution.id });
        };
        if *revision != expected {
            return Err(StoreError::Conflict {
                id: execution.id,
                expected: expected.value(),
                actual: revision.value(),
            });
        }
        *stored = execution.clone();
        *revision = expected.next();
        Ok(*revision)
    }

    async fn list(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowExecution>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<WorkflowExecution> = records
            .values()
            .filter(|(e, _)| e.workflow_id == workflow_id)
            .map(|(e, _)| e.clone())
            .collect();
        found.sort_by_key(|e| e.id);
        Ok(found)
    }
}

/// Store keeping one `<execution-id>.json` document per record in a directory.
///
/// Creates and saves hold an exclusive lock on `<execution-id>.lock` for the
/// whole read-check-write, so processes sharing the directory see each
/// other's revisions. Documents are staged in a uniquely named temporary
/// file and renamed into place, so a reader never sees a partial record.
#[derive(Debug, Clone)]
pub struct FileExecutionStore {
    dir: PathBuf,
}

impl FileExecutionStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory holding the documents.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Runs `op` on a blocking thread while holding the record's lock.
    async fn with_record_lock<T, F>(&self, id: ExecutionId, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|e| io_error(&e))?;
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(lock_path(&dir, id))
                .map_err(|e| io_error(&e))?;
            let mut lock = FileLock::new(file);
            let _guard = lock.write().map_err(|e| io_error(&e))?;
            op(&dir)
        })
        .await
        .map_err(|e| StoreError::Io {
            message: e.to_string(),
        })?
    }
}

fn document_path(dir: &Path, id: ExecutionId) -> PathBuf {
    dir.join(format!("{id}.json"))
}

fn lock_path(dir: &Path, id: ExecutionId) -> PathBuf {
    dir.join(format!("{id}.lock"))
}

fn io_error(e: &std::io::Error) -> StoreError {
    StoreError::Io {
        message: e.to_string(),
    }
}

fn parse_document(raw: &str) -> Result<ExecutionDocument, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

fn read_document(dir: &Path, id: ExecutionId) -> Result<ExecutionDocument, StoreError> {
    match std::fs::read_to_string(document_path(dir, id)) {
        Ok(raw) => parse_document(&raw),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound { id }),
        Err(e) => Err(io_error(&e)),
    }
}

fn write_document(dir: &Path, document: &ExecutionDocument) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(document).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })?;
    let mut staging = NamedTempFile::new_in(dir).map_err(|e| io_error(&e))?;
    staging.write_all(&bytes).map_err(|e| io_error(&e))?;
    staging
        .persist(document_path(dir, document.execution.id))
        .map_err(|e| io_error(&e.error))?;
    Ok(())
}

#[async_trait]
impl ExecutionStore for FileExecutionStore {
    #[instrument(skip(self, execution), fields(execution_id = %execution.id))]
    async fn create(&self, execution: &WorkflowExecution) -> Result<Revision, StoreError> {
        let id = execution.id;
        let document = ExecutionDocument::new(execution, Revision::INITIAL);
        self.with_record_lock(id, move |dir| {
            if document_path(dir, id).try_exists().map_err(|e| io_error(&e))? {
                return Err(StoreError::AlreadyExists { id });
            }
            write_document(dir, &document)
        })
        .await?;

        debug!("Created execution record");
        Ok(Revision::INITIAL)
    }

    #[instrument(skip(self), fields(execution_id = %id))]
    async fn load(&self, id: ExecutionId) -> Result<(WorkflowExecution, Revision), StoreError> {
        let raw = match tokio::fs::read_to_string(document_path(&self.dir, id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound { id }),
            Err(e) => return Err(io_error(&e)),
        };
        let document = parse_document(&raw)?;
        Ok((document.execution, document.revision))
    }

    #[instrument(skip(self, execution), fields(execution_id = %execution.id, expected = %expected))]
    async fn save(
        &self,
        execution: &WorkflowExecution,
        expected: Revision,
    ) -> Result<Revision, StoreError> {
        let id = execution.id;
        let next = expected.next();
        let document = ExecutionDocument::new(execution, next);
        self.with_record_lock(id, move |dir| {
            let current = read_document(dir, id)?.revision;
            if current != expected {
                return Err(StoreError::Conflict {
                    id,
                    expected: expected.value(),
                    actual: current.value(),
                });
            }
            write_document(dir, &document)
        })
        .await?;

        debug!(revision = %next, "Saved execution record");
        Ok(next)
    }

    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    async fn list(&self, workflow_id: WorkflowId) -> Result<Vec<WorkflowExecution>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&e))? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| io_error(&e))?;
            let document = parse_document(&raw)?;
            if document.execution.workflow_id == workflow_id {
                found.push(document.execution);
            }
        }

        found.sort_by_key(|e| e.id);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Workflow;
    use crate::execution::ExecutionStatus;
    use serde_json::Value as JsonValue;

    fn record(workflow: &Workflow) -> WorkflowExecution {
        let mut exec = WorkflowExecution::new(workflow);
        exec.start().expect("start");
        exec
    }

    async fn revisions_are_enforced(store: &dyn ExecutionStore) {
        let wf = Workflow::new("Store", "start");
        let mut exec = record(&wf);

        let rev = store.create(&exec).await.expect("create");
        assert_eq!(rev, Revision::INITIAL);
        assert!(matches!(
            store.create(&exec).await,
            Err(StoreError::AlreadyExists { .. })
        ));

        exec.info("first write", None);
        let rev2 = store.save(&exec, rev).await.expect("save");
        assert_eq!(rev2.value(), 2);

        let stale = store.save(&exec, rev).await.unwrap_err();
        assert_eq!(
            stale,
            StoreError::Conflict {
                id: exec.id,
                expected: 1,
                actual: 2
            }
        );

        let (loaded, loaded_rev) = store.load(exec.id).await.expect("load");
        assert_eq!(loaded_rev, rev2);
        assert_eq!(loaded.logs.len(), 1);
        assert_eq!(loaded.status, ExecutionStatus::Running);
    }

    async fn lists_by_workflow(store: &dyn ExecutionStore) {
        let wf = Workflow::new("Listed", "start");
        let other = Workflow::new("Other", "start");
        let first = record(&wf);
        let second = record(&wf);
        store.create(&second).await.expect("create");
        store.create(&first).await.expect("create");
        store.create(&record(&other)).await.expect("create");

        let listed = store.list(wf.id).await.expect("list");
        let ids: Vec<ExecutionId> = listed.iter().map(|e| e.id).collect();
        let mut expected = vec![first.id, second.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn in_memory_enforces_revisions() {
        revisions_are_enforced(&InMemoryExecutionStore::new()).await;
    }

    #[tokio::test]
    async fn in_memory_lists_by_workflow() {
        lists_by_workflow(&InMemoryExecutionStore::new()).await;
    }

    #[tokio::test]
    async fn in_memory_missing_record() {
        let store = InMemoryExecutionStore::new();
        let id = ExecutionId::new();
        assert_eq!(
            store.load(id).await.unwrap_err(),
            StoreError::NotFound { id }
        );
    }

    #[tokio::test]
    async fn file_store_enforces_revisions() {
        let dir = tempfile::tempdir().expect("tempdir");
        revisions_are_enforced(&FileExecutionStore::new(dir.path())).await;
    }

    #[tokio::test]
    async fn file_store_lists_by_workflow() {
        let dir = tempfile::tempdir().expect("tempdir");
        lists_by_workflow(&FileExecutionStore::new(dir.path().join("nested"))).await;
    }

    #[tokio::test]
    async fn file_store_list_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileExecutionStore::new(dir.path().join("absent"));
        assert!(store.list(WorkflowId::new()).await.expect("list").is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn file_stores_sharing_a_directory_reject_stale_writers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = FileExecutionStore::new(dir.path());
        let canceller = FileExecutionStore::new(dir.path());
        let wf = Workflow::new("Race", "start");

        for _ in 0..50 {
            let mut finished = record(&wf);
            runner.create(&finished).await.expect("create");
            let mut cancelled = finished.clone();
            cancelled.cancel().expect("cancel");
            finished
                .transition(ExecutionStatus::Success)
                .expect("finish");

            let (by_runner, by_canceller) = tokio::join!(
                runner.save(&finished, Revision::INITIAL),
                canceller.save(&cancelled, Revision::INITIAL)
            );
            let outcomes = [by_runner, by_canceller];
            let accepted: Vec<_> = outcomes.iter().filter(|r| r.is_ok()).collect();
            assert_eq!(accepted.len(), 1);
            assert!(outcomes.iter().any(|r| matches!(
                r,
                Err(StoreError::Conflict {
                    expected: 1,
                    actual: 2,
                    ..
                })
            )));

            let (stored, revision) = runner.load(finished.id).await.expect("load");
            assert_eq!(revision.value(), 2);
            let winner = if outcomes[0].is_ok() {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Cancelled
            };
            assert_eq!(stored.status, winner);
        }

        assert_eq!(runner.list(wf.id).await.expect("list").len(), 50);
    }

    #[tokio::test]
    async fn file_store_document_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileExecutionStore::new(dir.path());
        let exec = record(&Workflow::new("Shape", "start"));
        store.create(&exec).await.expect("create");

        let raw = std::fs::read_to_string(dir.path().join(format!("{}.json", exec.id)))
            .expect("document written");
        let doc: JsonValue = serde_json::from_str(&raw).expect("json");
        assert_eq!(doc["type"], "execution");
        assert_eq!(doc["revision"], 1);
        assert_eq!(doc["workflowName"], "Shape");
        assert_eq!(doc["status"], "running");
    }
}
