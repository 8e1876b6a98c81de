use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Unknown language key. The identifier is kept for logs, not for the client.
    #[error("Unsupported language")]
    UnsupportedLanguage(String),

    #[error("{0}")]
    CompilationError(String),

    #[error("{0}")]
    ExecutionError(String),

    #[error("timeout")]
    Timeout(Duration),

    /// The container runtime could not be reached (CLI missing, daemon down).
    #[error("Container backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("System error: {0}")]
    System(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Machine-readable failure category carried next to the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedLanguage,
    CompileError,
    RuntimeError,
    Timeout,
    BackendUnavailable,
    InvalidRequest,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            Error::CompilationError(_) => ErrorKind::CompileError,
            Error::ExecutionError(_) => ErrorKind::RuntimeError,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Error::Config(_) | Error::System(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Error::BackendUnavailable(_))
    }
}
