use crate::interface::RemoteError;
use crate::provisioning::ProvisioningFault;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RecorderError {
    #[error("Remote store rejected {operation}: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("Save of '{path}' still fails with {fault} after correction: {message}")]
    NotConverged {
        path: String,
        fault: ProvisioningFault,
        message: String,
    },

    #[error("Content '{path}' already exists")]
    AlreadyExists { path: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid repository path: {0}")]
    InvalidPath(String),

    #[error("Malformed query result: {0}")]
    MalformedResult(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RecorderError>;

impl RecorderError {
    /// Wraps a raw store error, keeping cancellation distinct from rejection.
    pub fn remote(operation: &'static str, err: RemoteError) -> Self {
        match err {
            RemoteError::Cancelled => Self::Cancelled,
            other => Self::Remote {
                operation,
                source: other,
            },
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
