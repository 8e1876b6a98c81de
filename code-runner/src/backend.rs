//! Command construction for the two execution backends.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::{
    config::RunnerConfig,
    job::Job,
    languages::StepKind,
    process::{CommandSpec, ProcessOutput},
    types::{Backend, ResourceLimits},
};

/// Mount point of the job directory inside the container
pub const CONTAINER_WORKDIR: &str = "/app";

/// Exit status the docker and podman CLIs use for their own failures
const RUNTIME_FAILURE_EXIT_CODE: i32 = 125;

fn daemon_unreachable() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)cannot connect to the docker daemon|is the docker daemon running|error during connect|permission denied while trying to connect to the docker daemon|cannot connect to podman|unable to connect to podman",
        )
        .expect("daemon pattern is valid")
    })
}

/// Whether a container step failed because the runtime itself is unreachable,
/// as opposed to the submitted program failing inside the container.
pub fn is_connectivity_failure(output: &ProcessOutput) -> bool {
    output.exit_code == Some(RUNTIME_FAILURE_EXIT_CODE) && daemon_unreachable().is_match(&output.stderr)
}

/// A rendered step ready to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub kind: StepKind,
    pub command: CommandSpec,
    /// Set for container steps so a timed-out container can be removed
    pub container_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandBuilder {
    runtime: String,
    images: Vec<(String, String)>,
    disable_network: bool,
    limits: ResourceLimits,
    user: String,
    host_path: String,
}

impl CommandBuilder {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            runtime: config.container_runtime.clone(),
            images: config
                .images
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            disable_network: config.disable_container_network,
            limits: config.limits.clone(),
            // files created in the mounted job dir must stay removable by us
            user: format!("{}:{}", nix::unistd::getuid(), nix::unistd::getgid()),
            host_path: std::env::var("PATH")
                .unwrap_or_else(|_| "/usr/local/bin:/usr/bin:/bin".to_string()),
        }
    }

    pub fn build(&self, job: &Job, backend: Backend) -> Vec<PlannedStep> {
        match backend {
            Backend::Container => self.container_steps(job),
            Backend::Local => self.local_steps(job),
        }
    }

    fn image_for(&self, job: &Job) -> &str {
        let language = job.language();
        self.images
            .iter()
            .find(|(key, _)| key == language.as_str())
            .map(|(_, image)| image.as_str())
            .unwrap_or(job.profile.image)
    }

    fn container_steps(&self, job: &Job) -> Vec<PlannedStep> {
        let source = format!("{}/{}", CONTAINER_WORKDIR, job.profile.source_file);
        let mount = format!("{}:{}", job.dir.display(), CONTAINER_WORKDIR);

        job.profile
            .container_steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let name = job.container_name(index);
                let mut command = CommandSpec::new(&self.runtime)
                    .args(["run", "--rm", "--name", name.as_str()])
                    .arg("--memory")
                    .arg(self.limits.memory.to_string())
                    .arg("--pids-limit")
                    .arg(self.limits.processes.to_string())
                    .arg("--ulimit")
                    .arg(format!("fsize={0}:{0}", self.limits.file_size))
                    .args(["--user", self.user.as_str()])
                    .args(["-e", "HOME=/tmp"]);
                if self.disable_network {
                    command = command.args(["--network", "none"]);
                }
                command = command
                    .args(["-v", mount.as_str(), "-w", CONTAINER_WORKDIR])
                    .arg(self.image_for(job))
                    .arg(step.program)
                    .args(step.render_args(&source, CONTAINER_WORKDIR));

                PlannedStep {
                    kind: step.kind,
                    command,
                    container_name: Some(name),
                }
            })
            .collect()
    }

    fn local_steps(&self, job: &Job) -> Vec<PlannedStep> {
        let source = path_arg(&job.source_path);
        let workdir = path_arg(&job.dir);

        job.profile
            .local_steps
            .iter()
            .map(|step| PlannedStep {
                kind: step.kind,
                command: CommandSpec::new(step.program)
                    .args(step.render_args(&source, &workdir))
                    .current_dir(&job.dir)
                    .env_clear()
                    .env("PATH", self.host_path.as_str())
                    .env("HOME", workdir.as_str())
                    .limits(self.limits.clone()),
                container_name: None,
            })
            .collect()
    }

    /// Force-remove a container left running after its CLI was killed
    pub fn remove_container(&self, name: &str) -> CommandSpec {
        CommandSpec::new(&self.runtime).args(["rm", "-f", name])
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
