//! Error types for ucbmd.
//!
//! One taxonomy shared by the adaptive loop and the structure builder.
//! Everything except [`UcbError::TransientClustering`] is fatal for the
//! current epoch or build.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all ucbmd operations.
#[derive(Error, Debug)]
pub enum UcbError {
    /// Unknown mode names, missing executables, conflicting options
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Inputs that disagree with each other (trajectory counts, missing atoms, empty outputs)
    #[error("Data consistency error: {0}")]
    DataConsistencyError(String),

    /// Pathological cluster count hit by the clustering collaborator; safe to retry
    #[error("Transient clustering failure: {0}")]
    TransientClustering(String),

    /// Clustering kept failing after the retry budget was spent
    #[error("Clustering failed after {attempts} attempts: {message}")]
    ClusteringError { attempts: usize, message: String },

    /// External executable failed to launch or exited non-zero
    #[error("{tool} failed: {message} (see {})", log_path.display())]
    ExternalTool {
        tool: String,
        log_path: PathBuf,
        message: String,
    },

    /// External executable exceeded its time budget
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// NaN, infinities, logarithms of non-positive values
    #[error("Numerical error: {0}")]
    NumericalError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl UcbError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        UcbError::ConfigurationError(message.into())
    }

    /// Creates a data consistency error.
    pub fn data(message: impl Into<String>) -> Self {
        UcbError::DataConsistencyError(message.into())
    }

    /// Creates a transient clustering error.
    pub fn transient_clustering(message: impl Into<String>) -> Self {
        UcbError::TransientClustering(message.into())
    }

    /// Creates the escalation raised once clustering retries are exhausted.
    pub fn clustering(attempts: usize, message: impl Into<String>) -> Self {
        UcbError::ClusteringError {
            attempts,
            message: message.into(),
        }
    }

    /// Creates an external tool error pointing at the tool's log.
    pub fn external_tool(
        tool: impl Into<String>,
        log_path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        UcbError::ExternalTool {
            tool: tool.into(),
            log_path: log_path.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        UcbError::Timeout(message.into())
    }

    /// Creates a numerical error.
    pub fn numerical(message: impl Into<String>) -> Self {
        UcbError::NumericalError(message.into())
    }

    /// Checks if this is a retriable error.
    ///
    /// Only transient clustering faults are retried, and only in place with
    /// identical parameters.
    pub fn is_retriable(&self) -> bool {
        matches!(self, UcbError::TransientClustering(_))
    }

    /// Returns a user-friendly error message with actionable guidance.
    pub fn user_message(&self) -> String {
        match self {
            UcbError::ConfigurationError(msg) => {
                format!(
                    "Configuration error: {}\n\
                     → Check mode names (metric|goal|tica|ticapcca, parent|frames, mean|max).\n\
                     → Check that required executables are on PATH.",
                    msg
                )
            }
            UcbError::DataConsistencyError(msg) => {
                format!(
                    "Data consistency error: {}\n\
                     → Check the goal function and projections against the same trajectories.",
                    msg
                )
            }
            UcbError::ClusteringError { attempts, message } => {
                format!(
                    "Clustering failed after {} attempts: {}\n\
                     → Try a different cluster count or clustering method.",
                    attempts, message
                )
            }
            UcbError::ExternalTool {
                tool,
                log_path,
                message,
            } => {
                format!(
                    "{} failed: {}\n\
                     → Inspect {} for the tool output.",
                    tool,
                    message,
                    log_path.display()
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias for ucbmd operations.
pub type Result<T> = std::result::Result<T, UcbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let config_err = UcbError::config("unknown reward mode");
        assert!(matches!(config_err, UcbError::ConfigurationError(_)));

        let data_err = UcbError::data("goal projection dropped trajectories");
        assert!(matches!(data_err, UcbError::DataConsistencyError(_)));

        let tool_err = UcbError::external_tool("tleap", "/tmp/build/log.txt", "exit status 1");
        assert!(matches!(tool_err, UcbError::ExternalTool { .. }));
        assert!(tool_err.to_string().contains("/tmp/build/log.txt"));
    }

    #[test]
    fn test_retriable_errors() {
        assert!(UcbError::transient_clustering("index out of range").is_retriable());
        assert!(!UcbError::clustering(10, "index out of range").is_retriable());
        assert!(!UcbError::config("bad").is_retriable());
        assert!(!UcbError::timeout("tleap").is_retriable());
    }

    #[test]
    fn test_user_message_mentions_log() {
        let err = UcbError::external_tool("tleap", "out/log.txt", "exit status 2");
        assert!(err.user_message().contains("out/log.txt"));
    }
}
