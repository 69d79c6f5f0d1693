//! Error types for the warmtab daemon.

use warmtab_rpc::protocol::RpcError;

/// Errors that can occur in the daemon
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Bridge error
    #[error("Bridge error: {0}")]
    Bridge(#[from] warmtab_rpc::Error),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),
}

impl From<DaemonError> for RpcError {
    fn from(err: DaemonError) -> Self {
        match err {
            DaemonError::Bridge(e) => RpcError::internal_error(e.to_string()),
            DaemonError::InvalidParams(msg) => RpcError::invalid_params(msg),
            DaemonError::MethodNotFound(name) => RpcError::new(
                warmtab_rpc::protocol::METHOD_NOT_FOUND,
                format!("Method not found: {name}"),
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
