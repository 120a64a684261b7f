//! Connectors and built-in node handlers for switchyard.
//!
//! This crate provides:
//!
//! - **Connector trait**: Common interface for external services
//! - **Connectors**: Console (dry run) and chat incoming-webhook
//! - **Handlers**: One node handler per built-in node type

pub mod connector;
pub mod connectors;
pub mod error;
pub mod handlers;

pub use connector::{
    Connector, ConnectorCapability, ConnectorInfo, ConnectorRegistry, Operation, OperationResult,
};
pub use connectors::{ChatWebhookConnector, ConsoleConnector};
pub use error::ConnectorError;
pub use handlers::builtin_registry;
