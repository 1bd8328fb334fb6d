//! Error types for the Amplistack provisioning system.
//!
//! This module provides the error hierarchy for every stage of a workflow:
//! spec loading and validation, stack operations, parameter binding,
//! artifact uploads, and the local state mirror.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Amplistack provisioning system.
#[derive(Debug, Error)]
pub enum AmplistackError {
    /// Application spec or settings errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Stack operation errors.
    #[error("Stack error: {0}")]
    Stack(#[from] StackError),

    /// Parameter binding and output extraction errors.
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// Local state mirror errors.
    #[error("Mirror error: {0}")]
    Mirror(#[from] MirrorError),

    /// Artifact upload errors.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Application spec and settings errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The spec file was not found.
    #[error("Spec file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The spec file could not be parsed.
    #[error("Failed to parse spec: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Spec validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Duplicate definition.
    #[error("Duplicate {resource_type} name: {name}")]
    DuplicateName {
        /// Type of entry (environment, branch, lambda).
        resource_type: String,
        /// The duplicated name.
        name: String,
    },
}

/// Stack operation errors.
#[derive(Debug, Error)]
pub enum StackError {
    /// The stack reached a failed or rolled-back terminal state.
    #[error("{operation} of stack {stack} ended in {status}: {reason}")]
    OperationFailed {
        /// Stack name.
        stack: String,
        /// Operation that was running.
        operation: String,
        /// Terminal status observed.
        status: String,
        /// Provider status reason.
        reason: String,
    },

    /// The provider rejected the request outright.
    #[error("{operation} of stack {stack} rejected: {message}")]
    Rejected {
        /// Stack name.
        stack: String,
        /// Operation that was requested.
        operation: String,
        /// Provider message.
        message: String,
    },

    /// The stack did not reach a terminal state in time.
    #[error("Timeout after {waited_secs}s waiting for {operation} of stack {stack}")]
    Timeout {
        /// Stack name.
        stack: String,
        /// Operation being waited on.
        operation: String,
        /// Seconds waited before giving up.
        waited_secs: u64,
    },

    /// Outputs were requested from a stack that is not in a readable state.
    #[error("Unable to get outputs for stack {stack} in state {status}")]
    InvalidState {
        /// Stack name.
        stack: String,
        /// Current status.
        status: String,
    },

    /// The stack does not exist.
    #[error("Stack not found: {stack}")]
    NotFound {
        /// Stack name.
        stack: String,
    },

    /// The provider returned something we could not interpret.
    #[error("Invalid response from stack provider: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Parameter binding errors.
#[derive(Debug, Error)]
pub enum ParameterError {
    /// A required output key is absent from a stack's outputs.
    #[error("Output {key} not found (available: {available})")]
    OutputNotFound {
        /// Requested output key.
        key: String,
        /// Comma separated list of available keys.
        available: String,
    },

    /// A carry-forward marker was used on a create.
    #[error("Parameter {key} cannot use its previous value on stack creation")]
    CarryForwardOnCreate {
        /// Parameter key.
        key: String,
    },
}

/// Local state mirror errors.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The mirror does not agree with what the workflow expects.
    #[error("Local state for '{alias}' is inconsistent: {message}")]
    Inconsistent {
        /// Application alias.
        alias: String,
        /// Description of the inconsistency.
        message: String,
    },

    /// A mirror file could not be read or parsed.
    #[error("Mirror is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("Mirror serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// A mirror file could not be written or removed.
    #[error("Failed to write {path}: {message}")]
    WriteFailed {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },
}

/// Artifact upload errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The local file to upload does not exist.
    #[error("Artifact source not found: {path}")]
    SourceMissing {
        /// Missing path.
        path: PathBuf,
    },

    /// The object store rejected the request.
    #[error("Object store request failed for s3://{bucket}/{key}: {message}")]
    RequestFailed {
        /// Bucket name.
        bucket: String,
        /// Object key (or prefix).
        key: String,
        /// Underlying error.
        message: String,
    },
}

/// Result type alias for Amplistack operations.
pub type Result<T> = std::result::Result<T, AmplistackError>;

impl AmplistackError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error means a stack operation did not succeed.
    #[must_use]
    pub const fn is_stack_operation_error(&self) -> bool {
        matches!(
            self,
            Self::Stack(
                StackError::OperationFailed { .. }
                    | StackError::Rejected { .. }
                    | StackError::Timeout { .. }
            )
        )
    }

    /// Returns a short stable label for log lines.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(ConfigError::ValidationError { .. }) => "validation",
            Self::Config(_) => "config",
            Self::Stack(StackError::InvalidState { .. }) => "stack-state",
            Self::Stack(_) => "stack-operation",
            Self::Parameter(ParameterError::OutputNotFound { .. }) => "output-not-found",
            Self::Parameter(_) => "parameter",
            Self::Mirror(MirrorError::Inconsistent { .. }) => "local-state-inconsistency",
            Self::Mirror(_) => "mirror",
            Self::Upload(_) => "upload",
            Self::Io(_) => "io",
            Self::Internal(_) => "internal",
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl StackError {
    /// Creates a rejection error.
    #[must_use]
    pub fn rejected(
        stack: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            stack: stack.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl MirrorError {
    /// Creates an inconsistency error.
    #[must_use]
    pub fn inconsistent(alias: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Inconsistent {
            alias: alias.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl UploadError {
    /// Creates a request failure.
    #[must_use]
    pub fn request(
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RequestFailed {
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_operation_classification() {
        let failed = AmplistackError::from(StackError::OperationFailed {
            stack: String::from("acme-amplify-app"),
            operation: String::from("create"),
            status: String::from("ROLLBACK_COMPLETE"),
            reason: String::from("boom"),
        });
        assert!(failed.is_stack_operation_error());
        assert_eq!(failed.kind(), "stack-operation");

        let state = AmplistackError::from(StackError::InvalidState {
            stack: String::from("auth"),
            status: String::from("CREATE_IN_PROGRESS"),
        });
        assert!(!state.is_stack_operation_error());
        assert_eq!(state.kind(), "stack-state");
    }

    #[test]
    fn test_kinds() {
        let err = AmplistackError::from(ConfigError::validation_general("nope"));
        assert_eq!(err.kind(), "validation");

        let err = AmplistackError::from(MirrorError::inconsistent("acme", "missing"));
        assert_eq!(err.kind(), "local-state-inconsistency");
        assert!(err.to_string().contains("acme"));
    }
}
