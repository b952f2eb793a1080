//! Generic HTTP webhook delivery channel.

pub mod channel;
pub mod config;

pub use channel::WebhookChannel;
pub use config::WebhookConfig;
