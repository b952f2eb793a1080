//! Chat-webhook delivery channel.
//!
//! Posts notifications as JSON to a chat service's incoming webhook with a
//! rich attachment block (status color by severity, labelled fields for
//! repository, branch, pull request, coverage, trend, and commit).

pub mod channel;
pub mod config;
pub mod types;

pub use channel::ChatChannel;
pub use config::ChatConfig;
pub use types::{Attachment, AttachmentField, ChatMessage, build_attachment, severity_color};
