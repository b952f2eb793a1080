use thiserror::Error;

/// Errors raised while validating event contents.
#[derive(Debug, Error)]
pub enum EventError {
    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field value is outside its documented domain.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl EventError {
    /// Stable error code for the taxonomy surfaced to callers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) | Self::InvalidValue { .. } => "config_invalid",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = EventError::MissingField("repository");
        assert_eq!(err.to_string(), "missing required field: repository");
        assert_eq!(err.code(), "config_invalid");
    }

    #[test]
    fn invalid_value_display() {
        let err = EventError::InvalidValue {
            field: "confidence",
            reason: "must be within [0, 1]".into(),
        };
        assert!(err.to_string().contains("confidence"));
    }
}
