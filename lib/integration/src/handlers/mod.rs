//! Built-in node handlers.
//!
//! One handler per node type. [`builtin_registry`] wires them all into a
//! [`HandlerRegistry`] ready for the engine.

mod ai_generate;
mod condition;
mod delay;
mod http_request;
mod integration;
mod log;
mod set_variables;
mod trigger;

pub use ai_generate::AiGenerateHandler;
pub use condition::ConditionHandler;
pub use delay::DelayHandler;
pub use http_request::HttpRequestHandler;
pub use integration::IntegrationHandler;
pub use log::LogHandler;
pub use set_variables::SetVariablesHandler;
pub use trigger::TriggerHandler;

use crate::connector::ConnectorRegistry;
use std::sync::Arc;
use switchyard_ai::FailoverChain;
use switchyard_workflow::{HandlerRegistry, Node, NodeError, NodeType};

/// Builds a registry with a handler for every known node type.
#[must_use]
pub fn builtin_registry(
    connectors: Arc<ConnectorRegistry>,
    generation: Arc<FailoverChain>,
) -> HandlerRegistry {
    let trigger = Arc::new(TriggerHandler);
    HandlerRegistry::new()
        .with(NodeType::Webhook, trigger.clone())
        .with(NodeType::Manual, trigger.clone())
        .with(NodeType::Schedule, trigger)
        .with(NodeType::HttpRequest, Arc::new(HttpRequestHandler::new()))
        .with(
            NodeType::Integration,
            Arc::new(IntegrationHandler::new(connectors)),
        )
        .with(
            NodeType::AiGenerate,
            Arc::new(AiGenerateHandler::new(generation)),
        )
        .with(NodeType::SetVariables, Arc::new(SetVariablesHandler))
        .with(NodeType::Delay, Arc::new(DelayHandler))
        .with(NodeType::Log, Arc::new(LogHandler))
        .with(NodeType::Condition, Arc::new(ConditionHandler))
}

/// Error for a handler invoked on a node of another type.
fn wrong_config(node: &Node, expected: NodeType) -> NodeError {
    NodeError::InvalidConfig {
        reason: format!(
            "node {} has type {}, expected {expected}",
            node.id,
            node.node_type()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_known_type() {
        let registry = builtin_registry(
            Arc::new(ConnectorRegistry::new()),
            Arc::new(FailoverChain::new(Vec::new())),
        );

        for node_type in [
            NodeType::Webhook,
            NodeType::Manual,
            NodeType::Schedule,
            NodeType::HttpRequest,
            NodeType::Integration,
            NodeType::AiGenerate,
            NodeType::SetVariables,
            NodeType::Delay,
            NodeType::Log,
            NodeType::Condition,
        ] {
            assert!(registry.contains(node_type), "{node_type} missing");
        }
        assert!(!registry.contains(NodeType::Unknown));
    }
}
