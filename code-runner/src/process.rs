//! Child process launching with a hard wall-clock timeout.
//!
//! Every child is started in its own process group so that a timeout can take
//! down the whole tree (shells, JVM helpers, forked workers) with one signal.

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::resource::{setrlimit, Resource};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time;
use tracing::{debug, warn};

use crate::{error::Error, types::ResourceLimits, Result};

/// A fully structured command: program plus argument vector, never a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// Start from an empty environment before applying `env`
    pub clear_env: bool,
    pub env: Vec<(String, String)>,
    /// rlimits applied in the child before exec
    pub limits: Option<ResourceLimits>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            clear_env: false,
            env: Vec::new(),
            limits: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env_clear(mut self) -> Self {
        self.clear_env = true;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// Captured outcome of a child that exited on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    /// Terminating signal, if the child was killed
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable exit description, used when stderr is empty
    pub fn status_message(&self) -> String {
        match (self.exit_code, self.signal) {
            (Some(code), _) => format!("Process exited with status {}", code),
            (None, Some(signal)) => format!("Process terminated by signal {}", signal),
            (None, None) => "Process terminated".to_string(),
        }
    }
}

/// Seam between command construction and the operating system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Run `command` to completion or kill it once `timeout` elapses.
    ///
    /// A missing program is reported as an `io::ErrorKind::NotFound` error so
    /// callers can tell an absent toolchain from a failing program.
    async fn launch(&self, command: &CommandSpec, timeout: Duration) -> Result<ProcessOutput>;
}

/// Launches real host processes through tokio.
#[derive(Debug, Clone)]
pub struct HostLauncher {
    max_output_bytes: usize,
}

impl HostLauncher {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }
}

impl Default for HostLauncher {
    fn default() -> Self {
        Self::new(1024 * 1024)
    }
}

#[async_trait]
impl ProcessLauncher for HostLauncher {
    async fn launch(&self, spec: &CommandSpec, timeout: Duration) -> Result<ProcessOutput> {
        let program = which::which(&spec.program).map_err(|_| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Command not found: {}", spec.program),
            ))
        })?;

        debug!("Launching {} {:?}", program.display(), spec.args);

        let mut command = Command::new(&program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);

        if spec.clear_env {
            command.env_clear();
        }
        command.envs(spec.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        if let Some(limits) = &spec.limits {
            let cpu_time = limits.cpu_time as u64;
            let file_size = limits.file_size;
            unsafe {
                command.pre_exec(move || {
                    setrlimit(Resource::RLIMIT_CPU, cpu_time, cpu_time).map_err(io::Error::from)?;
                    setrlimit(Resource::RLIMIT_FSIZE, file_size, file_size)
                        .map_err(io::Error::from)?;
                    Ok(())
                });
            }
        }

        let mut child = command.spawn()?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::System("child stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::System("child stderr was not captured".into()))?;

        let deadline = time::Instant::now() + timeout;
        let mut stdout_task = tokio::spawn(read_capped(stdout, self.max_output_bytes));
        let mut stderr_task = tokio::spawn(read_capped(stderr, self.max_output_bytes));

        let status = match time::timeout_at(deadline, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                kill_process_group(pid);
                if let Err(e) = child.kill().await {
                    debug!("Child already gone after timeout: {}", e);
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(Error::Timeout(timeout));
            }
        };

        // Reap stragglers that outlived the group leader; they would keep the pipes open.
        kill_process_group(pid);

        // A descendant that left the group (setsid) can still hold the pipes.
        let readers = async {
            let stdout = join_reader(&mut stdout_task).await;
            let stderr = join_reader(&mut stderr_task).await;
            (stdout, stderr)
        };
        let (stdout, stderr) = match time::timeout_at(deadline, readers).await {
            Ok((stdout, stderr)) => (stdout?, stderr?),
            Err(_) => {
                warn!("Output pipes of {} still open at the deadline", program.display());
                stdout_task.abort();
                stderr_task.abort();
                return Err(Error::Timeout(timeout));
            }
        };

        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Ok(ProcessOutput {
            exit_code: status.code(),
            signal,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

async fn read_capped<R>(mut reader: R, cap: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    (&mut reader).take(cap as u64).read_to_end(&mut buf).await?;
    tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok(buf)
}

async fn join_reader(task: &mut tokio::task::JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    task.await
        .map_err(|e| Error::System(format!("output reader failed: {}", e)))?
        .map_err(Error::Io)
}

fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}
