//! Core identifiers and error plumbing shared across switchyard crates.
//!
//! Domain crates own their error enums (graph, node, store, connector,
//! generation errors). Operations that cross a layer boundary wrap those
//! enums in a [`rootcause::Report`] and add the caller's context with
//! `.context()`, so a failed CLI command reads top-down from "what the user
//! asked for" to "which node or file broke".

pub mod id;

pub use id::{ExecutionId, ParseIdError, WorkflowId};

/// Result alias over rootcause reports.
///
/// `C` is the outermost context of the report; the default `()` is only used
/// where a caller does not care about the context type.
pub type Result<T, C = ()> = std::result::Result<T, rootcause::Report<C>>;
