//! Error types for the synthesis core

use thiserror::Error;

/// Result type alias for synthesis operations
pub type Result<T> = std::result::Result<T, VigilError>;

/// Error types raised while synthesizing monitoring artifacts.
///
/// Every variant aborts the synthesis pass. Nothing here is retried, there is
/// no I/O inside the core to retry.
#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid threshold for alarm {alarm}: {message}")]
    InvalidThreshold { alarm: String, message: String },

    #[error("Alarm name collision: {name} was already issued in this synthesis pass")]
    NameCollision { name: String },

    #[error("Alarm name too long: {name} ({length} > {max} characters)")]
    NameTooLong {
        name: String,
        length: usize,
        max: usize,
    },

    #[error("Unresolved composite alarm reference: {reference} matched no alarms (composite {composite})")]
    UnresolvedReference { composite: String, reference: String },

    #[error("Invalid monitoring for {resource}: {message}")]
    InvalidMonitoring { resource: String, message: String },

    #[error("Invalid metric {metric}: {message}")]
    InvalidMetric { metric: String, message: String },

    #[error("Backend rejected {resource}: {message}")]
    Backend { resource: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Synthesis aborted by an earlier failure: {0}")]
    Aborted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VigilError {
    /// Create an invalid threshold error
    pub fn invalid_threshold<S: Into<String>>(alarm: S, message: S) -> Self {
        Self::InvalidThreshold {
            alarm: alarm.into(),
            message: message.into(),
        }
    }

    /// Create an invalid monitoring error
    pub fn invalid_monitoring<S: Into<String>>(resource: S, message: S) -> Self {
        Self::InvalidMonitoring {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create an invalid metric error
    pub fn invalid_metric<S: Into<String>>(metric: S, message: S) -> Self {
        Self::InvalidMetric {
            metric: metric.into(),
            message: message.into(),
        }
    }

    /// Create a backend error
    pub fn backend<S: Into<String>>(resource: S, message: S) -> Self {
        Self::Backend {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error belongs to the configuration class
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            VigilError::Config(_)
                | VigilError::InvalidThreshold { .. }
                | VigilError::NameCollision { .. }
                | VigilError::NameTooLong { .. }
                | VigilError::UnresolvedReference { .. }
                | VigilError::InvalidMonitoring { .. }
                | VigilError::InvalidMetric { .. }
        )
    }

    /// Get the error category for log fields
    pub fn category(&self) -> &'static str {
        match self {
            VigilError::Config(_) => "config",
            VigilError::InvalidThreshold { .. } => "threshold",
            VigilError::NameCollision { .. } => "naming",
            VigilError::NameTooLong { .. } => "naming",
            VigilError::UnresolvedReference { .. } => "composite",
            VigilError::InvalidMonitoring { .. } => "monitoring",
            VigilError::InvalidMetric { .. } => "metric",
            VigilError::Backend { .. } => "backend",
            VigilError::Serialization(_) => "serialization",
            VigilError::Yaml(_) => "serialization",
            VigilError::Io(_) => "io",
            VigilError::Aborted(_) => "aborted",
            VigilError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_class() {
        assert!(VigilError::NameCollision { name: "a".into() }.is_configuration());
        assert!(VigilError::invalid_threshold("a", "b").is_configuration());
        assert!(!VigilError::internal("boom").is_configuration());
        assert!(!VigilError::Aborted("x".into()).is_configuration());
    }

    #[test]
    fn test_error_message_names_offender() {
        let err = VigilError::UnresolvedReference {
            composite: "Svc-Composite".into(),
            reference: "tag:svc-health".into(),
        };
        let message = err.to_string();
        assert!(message.contains("tag:svc-health"));
        assert!(message.contains("Svc-Composite"));
        assert_eq!(err.category(), "composite");
    }
}
