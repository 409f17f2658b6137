//! Inbound vendor webhooks.
pub mod classifier;
pub mod dedup;
pub mod processor;

pub use classifier::{WebhookEvent, classify};
pub use dedup::WebhookDeduplicator;
pub use processor::{WebhookOutcome, WebhookProcessor};
