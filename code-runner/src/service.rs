use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{
    config::RunnerConfig,
    error::{Error, ErrorKind},
    executor::CodeExecutor,
    fallback::FallbackController,
    janitor::Janitor,
    job::Job,
    languages,
    probe::BackendProbe,
    process::{HostLauncher, ProcessLauncher},
    types::{ExecutionRequest, ExecutionResult},
    Result,
};

/// Entry point for running submitted code: resolves the language, runs the
/// job through the fallback controller and always cleans up afterwards.
#[derive(Clone)]
pub struct CodeExecutionService {
    scratch_dir: PathBuf,
    probe: Arc<BackendProbe>,
    controller: Arc<FallbackController>,
    janitor: Janitor,
    semaphore: Option<Arc<Semaphore>>,
}

impl CodeExecutionService {
    pub async fn new(config: RunnerConfig) -> Result<Self> {
        let launcher = Arc::new(HostLauncher::new(config.max_output_bytes));
        Self::with_launcher(config, launcher).await
    }

    /// Build the service on top of a custom process launcher
    pub async fn with_launcher(
        config: RunnerConfig,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.scratch_dir)
            .await
            .map_err(|e| {
                Error::Config(format!(
                    "Failed to create scratch directory {}: {}",
                    config.scratch_dir.display(),
                    e
                ))
            })?;
        // container mounts need an absolute path
        let scratch_dir = tokio::fs::canonicalize(&config.scratch_dir).await?;

        let janitor = Janitor::new(&scratch_dir);
        janitor.sweep_stale().await;

        let probe = Arc::new(BackendProbe::new(&config, launcher.clone()));
        if probe.force_check().await {
            info!("Using container backend ({})", config.container_runtime);
        } else {
            info!("Container backend unavailable, using local toolchains");
        }

        let executor = CodeExecutor::new(&config, launcher);
        let controller = FallbackController::new(executor, probe.clone(), config.local_fallback);

        Ok(Self {
            scratch_dir,
            probe,
            controller: Arc::new(controller),
            janitor,
            semaphore: config
                .max_concurrent_executions
                .map(|max| Arc::new(Semaphore::new(max))),
        })
    }

    /// Start re-probing the container backend in the background
    pub fn start_monitor(&self) -> JoinHandle<()> {
        self.probe.clone().spawn_monitor()
    }

    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        // resolve before touching the filesystem
        let profile = languages::resolve(&request.language)?;

        // Run detached so a dropped request cannot skip cleanup halfway through.
        let service = self.clone();
        tokio::spawn(async move { service.run_job(profile, request.code).await })
            .await
            .map_err(|e| Error::System(format!("Execution task failed: {}", e)))?
    }

    async fn run_job(
        &self,
        profile: &'static languages::LanguageProfile,
        code: String,
    ) -> Result<ExecutionResult> {
        let _permit = match &self.semaphore {
            Some(semaphore) => Some(semaphore.acquire().await.map_err(|e| {
                Error::System(format!("Failed to acquire execution permit: {}", e))
            })?),
            None => None,
        };

        let mut job = Job::materialize(&self.scratch_dir, profile, &code).await?;
        debug!(job = %job.id, "Starting {} execution", profile.language);

        let result = self.controller.run(&mut job).await;
        self.janitor.cleanup(&job).await;

        match &result {
            Ok(_) => info!(job = %job.id, backend = %job.backend, "Code execution completed successfully"),
            Err(e) if e.kind() == ErrorKind::Internal => {
                error!(job = %job.id, "Code execution failed: {}", e)
            }
            Err(e) => info!(job = %job.id, backend = %job.backend, kind = ?e.kind(), "Code execution failed"),
        }

        result
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn container_available(&self) -> bool {
        self.probe.state().is_available()
    }

    /// Free admission slots, `None` when admission is unbounded
    pub fn get_available_slots(&self) -> Option<usize> {
        self.semaphore
            .as_ref()
            .map(|semaphore| semaphore.available_permits())
    }
}
