//! Framework error types

use crate::diagnostics::Diagnostics;
use thiserror::Error;

/// Errors raised by adapters and the provider server
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Unknown data source type: {0}")]
    UnknownDataSourceType(String),

    #[error("Type {type_name} is registered by both {first} and {second}")]
    DuplicateTypeName {
        type_name: String,
        first: String,
        second: String,
    },

    /// The single "resource absent" condition each adapter recognises.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Provider API failure, surfaced verbatim with the operation as context.
    #[error("{context}: {message}")]
    ApiError { context: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Validation(Diagnostics),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn api(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CloudError::ApiError {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::ResourceNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
