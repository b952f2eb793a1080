use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while delivering a notification through a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// A transient failure; the send may succeed on retry.
    #[error("transient delivery error: {0}")]
    Transient(String),

    /// A permanent failure; retrying will not help.
    #[error("permanent delivery error: {0}")]
    Permanent(String),

    /// The channel configuration is invalid. Never retried.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The send did not complete within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The remote endpoint rejected the request due to rate limiting.
    #[error("rate limited")]
    RateLimited,
}

impl ChannelError {
    /// Returns `true` if the error is transient and the send may succeed on
    /// retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::Timeout(_) | Self::RateLimited
        )
    }

    /// Stable error code for the taxonomy surfaced to callers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transient(_) => "channel_transient",
            Self::Permanent(_) => "channel_permanent",
            Self::Configuration(_) => "config_invalid",
            Self::Timeout(_) => "timeout",
            Self::RateLimited => "rate_limited",
        }
    }

    /// Classify an HTTP status code from a webhook-style endpoint.
    ///
    /// 2xx never reaches this function. 429 and 408 are retryable; any other
    /// 4xx is permanent; everything else is transient.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => Self::RateLimited,
            408 => Self::Transient(format!("HTTP {status}: {body}")),
            400..=499 => Self::Permanent(format!("HTTP {status}: {body}")),
            _ => Self::Transient(format!("HTTP {status}: {body}")),
        }
    }
}
