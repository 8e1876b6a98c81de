//! # Code Runner
//!
//! Runs untrusted code snippets for an online editor. Jobs execute inside a
//! container runtime when one is reachable and fall back to the host's own
//! toolchains when it is not.

mod backend;
mod config;
mod error;
mod executor;
mod fallback;
mod janitor;
mod job;
pub mod languages;
mod probe;
mod process;
mod report;
mod service;
mod types;

#[cfg(test)]
mod tests;

pub use backend::{is_connectivity_failure, CommandBuilder, PlannedStep, CONTAINER_WORKDIR};
pub use config::RunnerConfig;
pub use error::{Error, ErrorKind};
pub use executor::CodeExecutor;
pub use fallback::FallbackController;
pub use janitor::Janitor;
pub use job::Job;
pub use probe::{BackendProbe, BackendState};
pub use process::{CommandSpec, HostLauncher, ProcessLauncher, ProcessOutput};
pub use report::RunResponse;
pub use service::CodeExecutionService;
pub use types::{Backend, ExecutionRequest, ExecutionResult, Language, ResourceLimits};

/// Result type for code execution operations
pub type Result<T> = std::result::Result<T, Error>;
