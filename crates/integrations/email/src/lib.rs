//! SMTP email delivery channel.
//!
//! Renders notifications as plaintext with an optional HTML alternative
//! part and submits them through `lettre`, with STARTTLS or implicit TLS
//! depending on the configured port.

pub mod channel;
pub mod config;
pub mod message;

pub use channel::EmailChannel;
pub use config::{EmailConfig, TlsMode};
pub use message::{build_message, html_body, x_priority};
