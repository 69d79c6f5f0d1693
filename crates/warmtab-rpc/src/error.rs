//! Error types for the warmtab-rpc crate.
//!
//! This module provides a unified error type for all bridge operations.

use crate::transport::CodecError;

/// Unified error type for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Connection closed")]
    Disconnected,

    #[error("Request timeout")]
    Timeout,

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl Error {
    pub fn rpc(code: i32, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Error code reported by the extension, if any.
    #[must_use]
    pub fn rpc_code(&self) -> Option<i32> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<crate::protocol::RpcError> for Error {
    fn from(e: crate::protocol::RpcError) -> Self {
        Self::Rpc {
            code: e.code,
            message: e.message,
        }
    }
}

impl From<crate::client::ClientError> for Error {
    fn from(e: crate::client::ClientError) -> Self {
        match e {
            crate::client::ClientError::Io(e) => Self::Io(e),
            crate::client::ClientError::Codec(e) => Self::Codec(e),
            crate::client::ClientError::Json(e) => Self::Json(e),
            crate::client::ClientError::Rpc { code, message } => Self::Rpc { code, message },
            crate::client::ClientError::ConnectionClosed => Self::Disconnected,
            crate::client::ClientError::Timeout => Self::Timeout,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
