//! Vault error types.

use coldstash_protocol::ProtocolError;
use coldstash_transfer::TransferError;

/// Errors produced by vault operations and transfers.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any failure reported by the remote API, tagged with the failing call.
    #[error("{operation} failed: {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },

    #[error("unsupported archive description: {0}")]
    UnsupportedMetadata(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cancelled")]
    Cancelled,
}

impl VaultError {
    /// Wraps `err` as a remote failure of `operation`.
    ///
    /// Errors already attributed to the same operation pass through unchanged.
    pub fn remote(operation: &'static str, err: VaultError) -> Self {
        match err {
            Self::Remote {
                operation: op,
                message,
            } if op == operation => Self::Remote {
                operation: op,
                message,
            },
            other => Self::Remote {
                operation,
                message: other.to_string(),
            },
        }
    }

    /// Returns `true` for failures reported by the remote API.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

impl From<ProtocolError> for VaultError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnsupportedMetadata(description) => {
                Self::UnsupportedMetadata(description)
            }
            other => Self::Protocol(other.to_string()),
        }
    }
}
