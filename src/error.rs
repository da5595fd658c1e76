use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Central error type for mediapress
#[derive(Error, Debug)]
pub enum PressError {
    // ============================================================================
    // Provider Errors
    // ============================================================================
    #[error("{provider} failed: {message}")]
    ProviderFailed { provider: String, message: String },

    #[error("{0} returned an empty response")]
    EmptyResponse(String),

    // ============================================================================
    // External Tool Errors
    // ============================================================================
    #[error("{tool} exited with code {exit_code}: {stderr}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Failed to launch {tool}: {message}")]
    ToolSpawnFailed { tool: String, message: String },

    #[error("{operation} timed out after {limit:?}")]
    Timeout { operation: String, limit: Duration },

    // ============================================================================
    // Run Control Errors
    // ============================================================================
    #[error("cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline definition validation error
    #[error("Builder error: {0}")]
    BuilderError(String),

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Mutex lock error")]
    LockError,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PressError {
    /// Shorthand for a provider-side failure
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        PressError::ProviderFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Classify this error into the pipeline error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            PressError::ToolFailed { .. } | PressError::ToolSpawnFailed { .. } => {
                ErrorKind::ToolInvocationError
            }
            PressError::Timeout { .. } => ErrorKind::TimeoutError,
            PressError::Cancelled => ErrorKind::CancellationError,
            PressError::InvalidInput(_) => ErrorKind::InputValidationError,
            PressError::NotConfigured(_)
            | PressError::ConfigError(_)
            | PressError::BuilderError(_) => ErrorKind::ConfigurationSkip,
            PressError::ProviderFailed { .. }
            | PressError::EmptyResponse(_)
            | PressError::Io(_)
            | PressError::Json(_)
            | PressError::LockError
            | PressError::Internal(_) => ErrorKind::ProviderError,
        }
    }
}

/// Error taxonomy reported in stage results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A provider is not configured; a deliberate degrade path, not a failure
    ConfigurationSkip,
    /// An external call returned an error or unusable output
    ProviderError,
    /// An external process exited with a non-zero status
    ToolInvocationError,
    /// A bounded external operation exceeded its deadline
    TimeoutError,
    /// The caller requested an abort mid-run
    CancellationError,
    /// The initial artifact reference was invalid
    InputValidationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigurationSkip => "ConfigurationSkip",
            ErrorKind::ProviderError => "ProviderError",
            ErrorKind::ToolInvocationError => "ToolInvocationError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::CancellationError => "CancellationError",
            ErrorKind::InputValidationError => "InputValidationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Implement conversion from PoisonError for Mutex locks
impl<T> From<std::sync::PoisonError<T>> for PressError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        PressError::LockError
    }
}

// Helper type alias for Results
pub type PressResult<T> = Result<T, PressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PressError::Cancelled;
        assert_eq!(err.to_string(), "cancelled");
    }

    #[test]
    fn test_tool_failed_display() {
        let err = PressError::ToolFailed {
            tool: "ffmpeg".to_string(),
            exit_code: 1,
            stderr: "Invalid data found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ffmpeg"));
        assert!(msg.contains("code 1"));
        assert!(msg.contains("Invalid data found"));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            PressError::provider("whisper", "bad").kind(),
            ErrorKind::ProviderError
        );
        assert_eq!(
            PressError::EmptyResponse("chat".into()).kind(),
            ErrorKind::ProviderError
        );
        assert_eq!(
            PressError::Timeout {
                operation: "ffmpeg".into(),
                limit: Duration::from_secs(5)
            }
            .kind(),
            ErrorKind::TimeoutError
        );
        assert_eq!(PressError::Cancelled.kind(), ErrorKind::CancellationError);
        assert_eq!(
            PressError::InvalidInput("missing".into()).kind(),
            ErrorKind::InputValidationError
        );
        assert_eq!(
            PressError::NotConfigured("publisher".into()).kind(),
            ErrorKind::ConfigurationSkip
        );
    }

    #[test]
    fn test_timeout_display_keeps_sub_second_limits() {
        let err = PressError::Timeout {
            operation: "stage 'b'".into(),
            limit: Duration::from_millis(50),
        };
        assert_eq!(err.to_string(), "stage 'b' timed out after 50ms");

        let err = PressError::Timeout {
            operation: "ffmpeg".into(),
            limit: Duration::from_secs(600),
        };
        assert_eq!(err.to_string(), "ffmpeg timed out after 600s");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PressError = io_err.into();
        assert!(matches!(err, PressError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::ProviderError);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::TimeoutError.to_string(), "TimeoutError");
        let json = serde_json::to_string(&ErrorKind::CancellationError).unwrap();
        assert_eq!(json, "\"CancellationError\"");
    }
}
