use thiserror::Error;

use covgate_core::EventError;

/// Errors returned synchronously from `publish`.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The event failed minimum-field validation.
    #[error("validation failed: {0}")]
    Validation(#[from] EventError),

    /// A filter rejected the event.
    #[error("event rejected by filter '{filter}'")]
    Filtered {
        /// Name of the filter that rejected the event.
        filter: String,
    },

    /// An equivalent event was accepted within the deduplication window.
    #[error("duplicate of event '{original_id}'")]
    Duplicate {
        /// Id of the previously accepted event.
        original_id: String,
    },

    /// The bounded publish queue is full.
    #[error("publish queue is full")]
    QueueFull,

    /// The caller's cancellation handle fired while waiting for queue space.
    #[error("publish cancelled")]
    Cancelled,

    /// The processor has been stopped.
    #[error("processor is stopped")]
    Stopped,
}

impl PublishError {
    /// Stable error code for the taxonomy surfaced to callers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "config_invalid",
            Self::Filtered { .. } => "filtered",
            Self::Duplicate { .. } => "duplicate",
            Self::QueueFull => "queue_full",
            Self::Cancelled => "cancelled",
            Self::Stopped => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(
            PublishError::Filtered {
                filter: "deny-low".into()
            }
            .code(),
            "filtered"
        );
        assert_eq!(
            PublishError::Duplicate {
                original_id: "evt-1".into()
            }
            .code(),
            "duplicate"
        );
        assert_eq!(PublishError::QueueFull.code(), "queue_full");
        assert_eq!(PublishError::Cancelled.code(), "cancelled");
    }

    #[test]
    fn error_display() {
        let err = PublishError::Duplicate {
            original_id: "evt-9".into(),
        };
        assert_eq!(err.to_string(), "duplicate of event 'evt-9'");
    }
}
