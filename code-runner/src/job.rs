use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::Error,
    languages::LanguageProfile,
    types::{Backend, Language},
    Result,
};

/// Prefix of every job directory inside the scratch directory
pub(crate) const JOB_DIR_PREFIX: &str = "job-";

/// One execution of submitted source.
///
/// Everything a job writes (the source file, compiler output) lives in its own
/// directory under the scratch directory, named after the job id, so
/// concurrent jobs never share a path.
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub dir: PathBuf,
    pub source_path: PathBuf,
    pub profile: &'static LanguageProfile,
    /// Backend of the most recent attempt
    pub backend: Backend,
}

impl Job {
    /// Allocate a fresh id and write the source into `<scratch>/job-<id>/`.
    pub async fn materialize(
        scratch_dir: &Path,
        profile: &'static LanguageProfile,
        code: &str,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let dir = scratch_dir.join(format!("{}{}", JOB_DIR_PREFIX, id.simple()));

        // create_dir, not create_dir_all: an existing directory is a collision
        fs::create_dir(&dir).await.map_err(|e| {
            Error::System(format!("Failed to create job directory {}: {}", dir.display(), e))
        })?;

        let source_path = dir.join(profile.source_file);
        if let Err(e) = fs::write(&source_path, code).await {
            let _ = fs::remove_dir_all(&dir).await;
            return Err(Error::System(format!("Failed to write source file: {}", e)));
        }

        debug!(job = %id, language = %profile.language, "Materialized job in {}", dir.display());

        Ok(Self {
            id,
            dir,
            source_path,
            profile,
            backend: Backend::Local,
        })
    }

    pub fn language(&self) -> Language {
        self.profile.language
    }

    /// Container name for a step, so a timed-out container can be killed by name
    pub fn container_name(&self, step: usize) -> String {
        format!("code-runner-{}-{}", self.id.simple(), step)
    }
}
