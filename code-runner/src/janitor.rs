use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::job::{Job, JOB_DIR_PREFIX};

/// Removes job directories. Failures are logged and never returned: a stray
/// temp file must not change the response a client gets.
#[derive(Debug, Clone)]
pub struct Janitor {
    scratch_dir: PathBuf,
}

impl Janitor {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Delete the job's source file and every compiler artifact next to it.
    pub async fn cleanup(&self, job: &Job) {
        if !job.dir.starts_with(&self.scratch_dir) {
            warn!(job = %job.id, "Refusing to remove {} outside the scratch directory", job.dir.display());
            return;
        }

        match fs::remove_dir_all(&job.dir).await {
            Ok(()) => debug!(job = %job.id, "Removed {}", job.dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(job = %job.id, "Failed to clean up {}: {}", job.dir.display(), e),
        }
    }

    /// Remove job directories left behind by a previous process.
    ///
    /// Only called before the service accepts requests; while jobs are running
    /// every directory here belongs to a live job.
    pub async fn sweep_stale(&self) -> usize {
        let mut entries = match fs::read_dir(&self.scratch_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read scratch directory {}: {}", self.scratch_dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to list scratch directory: {}", e);
                    break;
                }
            };
            if !is_job_dir(&entry.path()) {
                continue;
            }
            match fs::remove_dir_all(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove stale {}: {}", entry.path().display(), e),
            }
        }

        if removed > 0 {
            info!("Removed {} stale job directories", removed);
        }
        removed
    }
}

fn is_job_dir(path: &Path) -> bool {
    path.is_dir()
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(JOB_DIR_PREFIX))
}
