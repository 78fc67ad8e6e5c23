//! Error types for the moderation pipeline.
//!
//! Classifier failures are split into two kinds because they are treated
//! differently by the retry scheduler: rate-limited failures are retried
//! outside the attempt budget, transient failures consume it.

use std::time::Duration;
use thiserror::Error;

/// Result type returned by external collaborators (repositories, services).
///
/// Collaborator failures are opaque to the pipeline; they are logged and
/// reported, never matched on.
pub type CollaboratorResult<T> = anyhow::Result<T>;

/// The main error type for moderation pipeline operations.
#[derive(Debug, Error)]
pub enum ModerationError {
    /// A classifier call failed.
    #[error("{0}")]
    Classifier(#[from] ClassifierError),

    /// A required collaborator was not supplied to a builder.
    #[error("Missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// The retry policy is not usable.
    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A background pipeline task panicked or was aborted.
    #[error("Pipeline task failed: {0}")]
    Task(String),
}

/// A failed call to the moderation classifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    /// The classifier asked us to back off for a specific duration.
    #[error("content moderation: rate limited, retry after {retry_after:?}: {message}")]
    RateLimited {
        /// How long the classifier asked us to wait.
        retry_after: Duration,
        /// Body or reason returned with the rate limit.
        message: String,
    },

    /// Any other failure: network error, bad status, unparseable response.
    #[error("content moderation: {0}")]
    Transient(String),
}

impl ClassifierError {
    /// Creates a rate-limited failure.
    #[must_use]
    pub fn rate_limited(retry_after: Duration, message: impl Into<String>) -> Self {
        Self::RateLimited {
            retry_after,
            message: message.into(),
        }
    }

    /// Creates a transient failure.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Returns true if this failure must not consume the attempt budget.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns the requested wait for rate-limited failures.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            Self::Transient(_) => None,
        }
    }
}

/// Error raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable or field held an unusable value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The variable or field name.
        key: String,
        /// What was wrong with it.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_accessors() {
        let err = ClassifierError::rate_limited(Duration::from_secs(3), "slow down");
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert!(err.to_string().contains("rate limited"));
        assert!(err.to_string().contains("slow down"));
    }

    #[test]
    fn test_transient_accessors() {
        let err = ClassifierError::transient("connection reset");
        assert!(!err.is_rate_limited());
        assert_eq!(err.retry_after(), None);
        assert_eq!(err.to_string(), "content moderation: connection reset");
    }

    #[test]
    fn test_moderation_error_from_classifier() {
        let err: ModerationError = ClassifierError::transient("boom").into();
        assert!(matches!(err, ModerationError::Classifier(_)));
        assert_eq!(err.to_string(), "content moderation: boom");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("GROQ_MODEL", "must not be empty");
        assert_eq!(err.to_string(), "Invalid value for GROQ_MODEL: must not be empty");

        let wrapped: ModerationError = err.into();
        assert!(matches!(wrapped, ModerationError::Config(_)));
    }

    #[test]
    fn test_missing_collaborator_display() {
        let err = ModerationError::MissingCollaborator("status updater");
        assert_eq!(err.to_string(), "Missing required collaborator: status updater");
    }
}
