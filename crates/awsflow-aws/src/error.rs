//! AWS adapter error types

use awsflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("AWS region is not configured. Set provider.region or AWS_REGION")]
    MissingRegion,

    /// The service reported the adapter's "resource absent" error code.
    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Service { code: Option<String>, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound(_))
    }

    /// Converts into the framework error, prefixing the failed operation
    ///
    /// `NotFound` becomes [`CloudError::ResourceNotFound`] so the provider
    /// server can apply its read / delete rules.
    pub fn into_cloud(self, context: impl Into<String>) -> CloudError {
        let context = context.into();
        match self {
            AwsError::NotFound(message) => {
                CloudError::ResourceNotFound(format!("{}: {}", context, message))
            }
            AwsError::Cloud(err) => err,
            other => CloudError::api(context, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
