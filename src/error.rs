//! Error types for the parley command interpreter.
//!
//! An utterance that matches nothing is not an error: it is
//! [`DispatchOutcome::Exhausted`](crate::intent::DispatchOutcome::Exhausted).
//! The variants here cover defects in the registry itself, configuration
//! problems and failures of the host capabilities used by built-in intents.

/// Top-level error type for the command interpreter.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    /// A command pattern could not be compiled.
    #[error("malformed pattern {pattern:?}: {reason}")]
    MalformedPattern {
        /// The offending pattern source.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A command spec violates a registration invariant.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A host capability (navigation, container runtime, file save) failed.
    #[error("host error: {0}")]
    Host(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, IntentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_malformed_pattern() {
        let err = IntentError::MalformedPattern {
            pattern: "open (the tab".into(),
            reason: "unclosed optional group".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed pattern \"open (the tab\": unclosed optional group"
        );
    }

    #[test]
    fn display_invalid_command() {
        let err = IntentError::InvalidCommand("no patterns".into());
        assert_eq!(err.to_string(), "invalid command: no patterns");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: IntentError = io.into();
        assert!(err.to_string().starts_with("I/O error"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IntentError>();
    }
}
