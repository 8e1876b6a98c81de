use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, ErrorKind},
    types::ExecutionResult,
    Result,
};

/// Wire shape of a `/run` response: `{"output": ...}` on success,
/// `{"error": ..., "kind": ...}` on any failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunResponse {
    Output { output: String },
    Error { error: String, kind: ErrorKind },
}

impl RunResponse {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        RunResponse::Error {
            error: message.into(),
            kind,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RunResponse::Error { .. })
    }
}

impl From<ExecutionResult> for RunResponse {
    fn from(result: ExecutionResult) -> Self {
        if !result.stderr.is_empty() {
            debug!(backend = %result.backend, "Dropping stderr of successful run: {}", result.stderr.trim());
        }
        RunResponse::Output {
            output: result.stdout,
        }
    }
}

impl From<Error> for RunResponse {
    fn from(error: Error) -> Self {
        RunResponse::error(error.kind(), error.to_string())
    }
}

impl From<Result<ExecutionResult>> for RunResponse {
    fn from(outcome: Result<ExecutionResult>) -> Self {
        match outcome {
            Ok(result) => result.into(),
            Err(error) => error.into(),
        }
    }
}
