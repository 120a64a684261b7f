//! Connectors shipped with switchyard.

mod chat_webhook;
mod console;

pub use chat_webhook::ChatWebhookConnector;
pub use console::ConsoleConnector;
