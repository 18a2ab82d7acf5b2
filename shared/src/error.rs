//! Error types for the Code Mentor Lambda functions.

use thiserror::Error;

use crate::gateway::ModelKind;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving a mentor request.
#[derive(Error, Debug)]
pub enum Error {
    /// A required request field is missing or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream model call failed (transport, serialization or decode)
    #[error("{kind} model invocation failed: {cause}")]
    Invocation { kind: ModelKind, cause: String },

    /// Upstream translation call failed
    #[error("Translation to '{target_language}' failed: {cause}")]
    Translation {
        target_language: String,
        cause: String,
    },

    /// The model produced no usable text
    #[error("Model returned an empty response")]
    EmptyResponse,

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap any displayable failure as an invocation error for `kind`.
    pub fn invocation(kind: ModelKind, cause: impl ToString) -> Self {
        Error::Invocation {
            kind,
            cause: cause.to_string(),
        }
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            _ => 500,
        }
    }

    /// Stable error kind reported to clients.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            Error::Invocation { .. } => "InvocationError",
            Error::Translation { .. } => "TranslationError",
            Error::EmptyResponse => "EmptyResponseError",
            _ => "InternalError",
        }
    }

    /// Message safe to show to a client.
    ///
    /// Validation errors are actionable and returned verbatim; everything else
    /// is reduced to a generic description and the details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Error::Validation(message) => message.clone(),
            Error::Invocation { kind, .. } => {
                format!("The {} model could not be reached. Please try again.", kind)
            }
            Error::Translation { target_language, .. } => {
                format!("Translation to '{}' is currently unavailable", target_language)
            }
            Error::EmptyResponse => "The model returned an empty response. Please try again.".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}
