//! Error types for coach evaluation operations

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Error types for the evaluation harness
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Configuration error (missing credentials, invalid settings)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider transport or API error
    #[error("Provider error: {0}")]
    Provider(String),

    /// An external call exceeded its deadline
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Malformed model output
    #[error("Parse error: {0}")]
    Parse(#[from] crate::parsing::ParseError),

    /// Scenario library error (duplicate ids, unreadable scenario file)
    #[error("Scenario library error: {0}")]
    Library(String),

    /// A data-model invariant was violated; aborts the current phase
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML scenario file error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl EvalError {
    /// Build a timeout error for the named operation
    pub fn timeout(operation: impl Into<String>, limit: std::time::Duration) -> Self {
        EvalError::Timeout {
            operation: operation.into(),
            seconds: limit.as_secs(),
        }
    }

    /// Whether this error should abort the current phase rather than be
    /// recorded on an artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EvalError::Invariant(_) | EvalError::Io(_) | EvalError::Configuration(_)
        )
    }
}

impl From<String> for EvalError {
    fn from(s: String) -> Self {
        EvalError::Other(s)
    }
}

impl From<&str> for EvalError {
    fn from(s: &str) -> Self {
        EvalError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for EvalError {
    fn from(err: anyhow::Error) -> Self {
        EvalError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_display() {
        let err = EvalError::timeout("generation", Duration::from_secs(120));
        assert_eq!(err.to_string(), "generation timed out after 120s");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EvalError::Invariant("dup".into()).is_fatal());
        assert!(EvalError::Io(std::io::Error::other("disk")).is_fatal());
        assert!(!EvalError::Provider("503".into()).is_fatal());
        assert!(!EvalError::timeout("judge", Duration::from_secs(1)).is_fatal());
    }
}
