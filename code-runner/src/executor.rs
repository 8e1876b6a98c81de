use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    backend::{is_connectivity_failure, CommandBuilder, PlannedStep},
    config::RunnerConfig,
    error::Error,
    job::Job,
    languages::StepKind,
    process::{ProcessLauncher, ProcessOutput},
    types::{Backend, ExecutionResult},
    Result,
};

/// SIGXCPU: the CPU rlimit ran out before the wall clock did
const SIGXCPU: i32 = 24;

/// Budget for removing a container whose CLI was killed on timeout
const CONTAINER_REMOVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs a materialized job's steps against one backend.
pub struct CodeExecutor {
    launcher: Arc<dyn ProcessLauncher>,
    commands: CommandBuilder,
    timeout: Duration,
}

impl CodeExecutor {
    pub fn new(config: &RunnerConfig, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            launcher,
            commands: CommandBuilder::new(config),
            timeout: config.timeout,
        }
    }

    /// Execute every step of the job on `backend` within one shared deadline.
    ///
    /// Fails with `CompilationError` or `ExecutionError` carrying stderr when the
    /// program fails, `Timeout` when the deadline passes, and
    /// `BackendUnavailable` when the container runtime cannot be reached.
    pub async fn run(&self, job: &mut Job, backend: Backend) -> Result<ExecutionResult> {
        job.backend = backend;
        let deadline = Instant::now() + self.timeout;
        let steps = self.commands.build(job, backend);

        let mut last = ProcessOutput::default();
        for step in &steps {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(self.timeout));
            }

            debug!(job = %job.id, %backend, "Running {:?} step: {}", step.kind, step.command.program);
            let output = self.launch_step(step, backend, remaining).await?;

            if backend == Backend::Container && is_connectivity_failure(&output) {
                return Err(Error::BackendUnavailable(output.stderr.trim().to_string()));
            }
            if output.signal == Some(SIGXCPU) {
                return Err(Error::Timeout(self.timeout));
            }
            if !output.success() {
                let message = if output.stderr.trim().is_empty() {
                    output.status_message()
                } else {
                    output.stderr
                };
                return Err(match step.kind {
                    StepKind::Compile => Error::CompilationError(message),
                    StepKind::Run => Error::ExecutionError(message),
                });
            }
            last = output;
        }

        Ok(ExecutionResult {
            stdout: last.stdout,
            stderr: last.stderr,
            backend,
        })
    }

    async fn launch_step(
        &self,
        step: &PlannedStep,
        backend: Backend,
        remaining: Duration,
    ) -> Result<ProcessOutput> {
        match self.launcher.launch(&step.command, remaining).await {
            Ok(output) => Ok(output),
            Err(Error::Timeout(_)) => {
                if let Some(name) = &step.container_name {
                    self.remove_container(name).await;
                }
                Err(Error::Timeout(self.timeout))
            }
            // the runtime CLI itself could not be started
            Err(e) if backend == Backend::Container => Err(Error::BackendUnavailable(e.to_string())),
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Err(Error::System(format!(
                "{} is not installed on this host",
                step.command.program
            ))),
            Err(e) => Err(e),
        }
    }

    async fn remove_container(&self, name: &str) {
        let command = self.commands.remove_container(name);
        match self.launcher.launch(&command, CONTAINER_REMOVE_TIMEOUT).await {
            Ok(output) if output.success() => debug!("Removed timed-out container {}", name),
            // the CLI may have died before the container was created
            Ok(output) => debug!("Container {} not removed: {}", name, output.stderr.trim()),
            Err(e) => warn!("Failed to remove container {}: {}", name, e),
        }
    }
}
