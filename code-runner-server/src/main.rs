use clap::Parser;
use code_runner::RunnerConfig;
use code_runner_server::{create_app, run_server, DEFAULT_MAX_BODY_BYTES};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to listen on
    #[arg(short, long, env = "CODE_RUNNER_ADDR", default_value = "0.0.0.0:3001")]
    addr: SocketAddr,

    /// TOML file with runner settings; flags below override it
    #[arg(short, long, env = "CODE_RUNNER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding per-job scratch directories
    #[arg(long, env = "CODE_RUNNER_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Wall-clock limit per request in seconds
    #[arg(long, env = "CODE_RUNNER_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Minimum seconds between container backend probes
    #[arg(long, env = "CODE_RUNNER_PROBE_COOLDOWN_SECS")]
    probe_cooldown_secs: Option<u64>,

    /// Container runtime CLI (docker, podman or a path)
    #[arg(long, env = "CODE_RUNNER_CONTAINER_RUNTIME")]
    container_runtime: Option<String>,

    /// Maximum number of concurrent executions (unbounded when unset)
    #[arg(short, long, env = "CODE_RUNNER_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Request body limit in bytes
    #[arg(long, env = "CODE_RUNNER_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Fail instead of running on host toolchains when the container runtime is unreachable
    #[arg(long, env = "CODE_RUNNER_NO_LOCAL_FALLBACK")]
    no_local_fallback: bool,
}

impl Args {
    fn runner_config(&self) -> anyhow::Result<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::from_file(path)?,
            None => RunnerConfig::default(),
        };

        if let Some(dir) = &self.scratch_dir {
            config = config.with_scratch_dir(dir);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.probe_cooldown_secs {
            config = config.with_probe_cooldown(Duration::from_secs(secs));
        }
        if let Some(runtime) = &self.container_runtime {
            config = config.with_container_runtime(runtime);
        }
        if self.max_concurrent.is_some() {
            config = config.with_max_concurrent_executions(self.max_concurrent);
        }
        if self.no_local_fallback {
            config = config.with_local_fallback(false);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.runner_config()?;
    info!(
        "Scratch directory {}, timeout {:?}, runtime {}",
        config.scratch_dir.display(),
        config.timeout,
        config.container_runtime
    );

    let app = create_app(config, args.max_body_bytes).await?;
    run_server(app, args.addr).await?;

    Ok(())
}
