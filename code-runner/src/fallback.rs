use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    error::Error,
    executor::CodeExecutor,
    job::Job,
    probe::BackendProbe,
    types::{Backend, ExecutionResult},
    Result,
};

/// Picks the backend for a job and retries once on the local backend when the
/// container runtime turns out to be unreachable.
pub struct FallbackController {
    executor: CodeExecutor,
    probe: Arc<BackendProbe>,
    local_fallback: bool,
}

impl FallbackController {
    pub fn new(executor: CodeExecutor, probe: Arc<BackendProbe>, local_fallback: bool) -> Self {
        Self {
            executor,
            probe,
            local_fallback,
        }
    }

    /// A job is attempted against at most two backends; the second attempt's
    /// outcome is final.
    pub async fn run(&self, job: &mut Job) -> Result<ExecutionResult> {
        let state = self.probe.state();
        let backend = if state.is_available() {
            Backend::Container
        } else {
            Backend::Local
        };

        match self.executor.run(job, backend).await {
            Err(Error::BackendUnavailable(reason)) if backend == Backend::Container => {
                warn!(job = %job.id, "Container backend failed: {}", reason);
                state.mark_unavailable();
                self.reprobe();

                if !self.local_fallback {
                    return Err(Error::BackendUnavailable(reason));
                }
                info!(job = %job.id, "Retrying on the local backend");
                self.executor.run(job, Backend::Local).await
            }
            outcome => outcome,
        }
    }

    /// Let the probe confirm the failure in the background; throttled by the
    /// probe's cooldown.
    fn reprobe(&self) {
        let probe = self.probe.clone();
        tokio::spawn(async move {
            probe.check_availability().await;
        });
    }
}
