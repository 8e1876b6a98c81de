pub mod defaults {
    use crate::{ResourceLimits, RunnerConfig};
    use std::path::Path;
    use tokio::time::Duration;

    /// A runtime path that never resolves, so every job runs locally
    pub const MISSING_RUNTIME: &str = "/nonexistent/code-runner-test/docker";

    pub fn default_timeout() -> Duration {
        Duration::from_secs(8)
    }

    pub fn short_timeout() -> Duration {
        Duration::from_secs(1)
    }

    pub fn test_config(scratch: &Path) -> RunnerConfig {
        RunnerConfig::default()
            .with_scratch_dir(scratch)
            .with_timeout(default_timeout())
            .with_probe_timeout(Duration::from_secs(2))
            .with_container_runtime(MISSING_RUNTIME)
            .with_limits(ResourceLimits::default())
    }
}

/// Stand-in container CLIs written as shell scripts
pub mod runtimes {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::OnceLock;
    use tempfile::TempDir;

    /// Answers probes but fails every `run` the way an unreachable daemon does
    const DAEMON_DOWN: &str = r#"#!/bin/sh
case "$1" in
  --version|info|rm) exit 0 ;;
esac
echo "docker: Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?" >&2
exit 125
"#;

    /// Runs the image command on the host with the mount path swapped in
    const PASSTHROUGH: &str = r#"#!/bin/sh
case "$1" in
  --version) echo "Docker version 0.0.0-test"; exit 0 ;;
  info) echo "0.0.0-test"; exit 0 ;;
  rm) exit 0 ;;
  run) shift ;;
  *) exit 1 ;;
esac
mount=""
workdir=""
while [ $# -gt 0 ]; do
  case "$1" in
    --rm) shift ;;
    -v) mount="${2%%:*}"; workdir="${2#*:}"; shift 2 ;;
    -*) shift 2 ;;
    *) break ;;
  esac
done
shift
prog="$1"; shift
command -v "$prog" >/dev/null 2>&1 || prog="${prog}3"
n=$#
while [ "$n" -gt 0 ]; do
  arg="$1"; shift
  case "$arg" in
    "$workdir"*) arg="$mount${arg#"$workdir"}" ;;
  esac
  set -- "$@" "$arg"
  n=$((n - 1))
done
cd "$mount" && exec "$prog" "$@"
"#;

    struct Scripts {
        _dir: TempDir,
        daemon_down: PathBuf,
        passthrough: PathBuf,
    }

    // Written once per test binary: executing a file another thread may still
    // hold open for writing fails with ETXTBSY.
    fn scripts() -> &'static Scripts {
        static SCRIPTS: OnceLock<Scripts> = OnceLock::new();
        SCRIPTS.get_or_init(|| {
            let dir = tempfile::tempdir().unwrap();
            let daemon_down = write_script(dir.path(), "docker-down", DAEMON_DOWN);
            let passthrough = write_script(dir.path(), "docker-passthrough", PASSTHROUGH);
            Scripts {
                _dir: dir,
                daemon_down,
                passthrough,
            }
        })
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    pub fn daemon_down() -> String {
        scripts().daemon_down.to_string_lossy().into_owned()
    }

    pub fn passthrough() -> String {
        scripts().passthrough.to_string_lossy().into_owned()
    }
}
