use thiserror::Error;

use crate::host::HostError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid URL pattern: {0}")]
    Pattern(String),
}

pub type Result<T> = std::result::Result<T, Error>;
