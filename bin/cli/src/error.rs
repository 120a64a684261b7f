//! Error contexts for runner commands.

use std::fmt;
use std::path::PathBuf;

/// What the runner was doing when something failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// Reading a file failed.
    ReadFile { path: PathBuf },
    /// Loading the workflow definition failed.
    LoadWorkflow { path: PathBuf },
    /// The workflow graph is malformed.
    InvalidWorkflow { path: PathBuf },
    /// The run input is not valid JSON.
    ParseInput { origin: String },
    /// An execution id could not be parsed.
    ParseExecutionId { id: String },
    /// The execution record could not be loaded.
    LoadExecution { id: String },
    /// The execution could not be cancelled.
    Cancel { id: String },
    /// Writing output failed.
    Output,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path } => write!(f, "failed to read {}", path.display()),
            Self::LoadWorkflow { path } => {
                write!(f, "failed to load workflow from {}", path.display())
            }
            Self::InvalidWorkflow { path } => {
                write!(f, "workflow in {} is invalid", path.display())
            }
            Self::ParseInput { origin } => write!(f, "input from {origin} is not valid JSON"),
            Self::ParseExecutionId { id } => write!(f, "'{id}' is not an execution id"),
            Self::LoadExecution { id } => write!(f, "failed to load execution {id}"),
            Self::Cancel { id } => write!(f, "failed to cancel execution {id}"),
            Self::Output => write!(f, "failed to write output"),
        }
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_path() {
        let err = CliError::LoadWorkflow {
            path: PathBuf::from("flows/order.json"),
        };
        assert_eq!(
            err.to_string(),
            "failed to load workflow from flows/order.json"
        );
    }
}
