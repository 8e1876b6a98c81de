//! Container backend availability probe.
//!
//! [`BackendState`] is the shared, advisory verdict every job reads before
//! choosing a backend. Readers never block: the verdict and the time of the
//! last probe live in atomics. Writers are the probe and the fallback path,
//! last writer wins.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    config::RunnerConfig,
    process::{CommandSpec, ProcessLauncher},
};

#[derive(Debug)]
pub struct BackendState {
    available: AtomicBool,
    /// Milliseconds since `epoch` plus one; zero means never probed
    last_checked: AtomicU64,
    epoch: Instant,
}

impl BackendState {
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
            last_checked: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Flip the verdict to unavailable without touching the probe timestamp,
    /// so the next scheduled probe still runs on time.
    pub fn mark_unavailable(&self) {
        if self.available.swap(false, Ordering::AcqRel) {
            warn!("Container backend marked unavailable, jobs will run locally");
        }
    }

    pub fn last_checked(&self) -> Option<Instant> {
        match self.last_checked.load(Ordering::Acquire) {
            0 => None,
            stamp => Some(self.epoch + Duration::from_millis(stamp - 1)),
        }
    }

    fn record_probe(&self, available: bool) {
        let stamp = self.epoch.elapsed().as_millis() as u64 + 1;
        self.last_checked.store(stamp, Ordering::Release);
        let previous = self.available.swap(available, Ordering::AcqRel);
        if previous != available {
            if available {
                info!("Container backend is available");
            } else {
                warn!("Container backend is not available, using local toolchains");
            }
        }
    }
}

impl Default for BackendState {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Resets the in-flight flag even if the probing future is dropped.
struct ProbeGuard<'a>(&'a AtomicBool);

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct BackendProbe {
    runtime: String,
    probe_timeout: Duration,
    cooldown: Duration,
    state: Arc<BackendState>,
    launcher: Arc<dyn ProcessLauncher>,
    in_flight: AtomicBool,
}

impl BackendProbe {
    pub fn new(config: &RunnerConfig, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            runtime: config.container_runtime.clone(),
            probe_timeout: config.probe_timeout,
            cooldown: config.probe_cooldown,
            state: Arc::new(BackendState::default()),
            launcher,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> Arc<BackendState> {
        self.state.clone()
    }

    /// Probe unless the last probe is younger than the cooldown.
    pub async fn check_availability(&self) -> bool {
        if let Some(last) = self.state.last_checked() {
            if last.elapsed() < self.cooldown {
                return self.state.is_available();
            }
        }
        self.force_check().await
    }

    /// Probe now, ignoring the cooldown. A probe already in flight is not
    /// duplicated; the caller gets the current verdict instead.
    pub async fn force_check(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return self.state.is_available();
        }
        let _guard = ProbeGuard(&self.in_flight);

        let available = self.probe().await;
        self.state.record_probe(available);
        available
    }

    async fn probe(&self) -> bool {
        let version = CommandSpec::new(&self.runtime).arg("--version");
        match self.launcher.launch(&version, self.probe_timeout).await {
            Ok(output) if output.success() => {
                debug!("{} CLI: {}", self.runtime, output.stdout.trim());
            }
            Ok(output) => {
                debug!("{} --version failed: {}", self.runtime, output.stderr.trim());
                return false;
            }
            Err(e) => {
                debug!("{} CLI unavailable: {}", self.runtime, e);
                return false;
            }
        }

        let info = CommandSpec::new(&self.runtime).args(["info", "--format", "{{.ServerVersion}}"]);
        match self.launcher.launch(&info, self.probe_timeout).await {
            Ok(output) if output.success() => {
                debug!("{} daemon version {}", self.runtime, output.stdout.trim());
                true
            }
            Ok(output) => {
                debug!("{} daemon unreachable: {}", self.runtime, output.stderr.trim());
                false
            }
            Err(e) => {
                debug!("{} info failed: {}", self.runtime, e);
                false
            }
        }
    }

    /// Re-probe every cooldown interval for the lifetime of the process.
    pub fn spawn_monitor(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = time::Instant::now() + self.cooldown;
            let mut ticker = time::interval_at(start, self.cooldown);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.force_check().await;
            }
        })
    }
}
