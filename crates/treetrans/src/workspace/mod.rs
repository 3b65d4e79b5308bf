//! Per-job directories on disk.
//!
//! ```text
//! <jobs base dir>/
//! ├── <job id>/
//! │   ├── input/          staged upload or cloned repository
//! │   └── translated.zip
//! └── outputs/<name>/     named output folders
//! ```

pub mod remote;
pub mod staging;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Settings;
use crate::error::WorkspaceError;
use crate::path_safety::{absolute_normalized, resolve_safe_path};
use crate::sanitize;

pub use remote::{clone_repository, normalize_github_url};
pub use staging::{stage_uploads, UploadedFile};

static RE_OUTPUT_FOLDER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{0,63}$").unwrap());

/// Subdirectory of the jobs base dir that holds named output folders.
const NAMED_OUTPUTS_DIR: &str = "outputs";

/// Directories owned by one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub archive: PathBuf,
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    base_dir: PathBuf,
    restricted: bool,
    archive_name: String,
}

impl WorkspaceManager {
    pub fn new(base_dir: impl Into<PathBuf>, restricted: bool, archive_name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            restricted,
            archive_name: archive_name.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.jobs_base_dir.clone(),
            settings.restricted_environment,
            settings.archive_name.clone(),
        )
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolves the output location a submitter asked for.
    ///
    /// A bare folder name maps to `<base>/outputs/<name>`. Anything else is
    /// treated as a path (with `~` expanded) and made absolute. Filesystem
    /// roots are refused, and a restricted host only accepts paths under the
    /// system temp directory.
    pub fn resolve_output_location(&self, requested: &str) -> Result<PathBuf, WorkspaceError> {
        let requested = requested.trim();
        if requested.is_empty() {
            return Err(WorkspaceError::InvalidOutputLocation(
                "An output folder is required".to_string(),
            ));
        }

        if is_named_output_folder(requested) {
            return Ok(self.base_dir.join(NAMED_OUTPUTS_DIR).join(requested));
        }

        let expanded = expand_home(requested);
        let resolved = absolute_normalized(&expanded).map_err(|e| {
            WorkspaceError::InvalidOutputLocation(format!("Cannot resolve output folder: {}", e))
        })?;

        if resolved.parent().is_none() {
            return Err(WorkspaceError::InvalidOutputLocation(
                "The output folder cannot be a filesystem root".to_string(),
            ));
        }

        if self.restricted {
            let temp = absolute_normalized(&std::env::temp_dir()).unwrap_or_else(|_| std::env::temp_dir());
            if !resolved.starts_with(&temp) {
                return Err(WorkspaceError::InvalidOutputLocation(format!(
                    "This environment only accepts output folders under {}",
                    temp.display()
                )));
            }
        }

        Ok(resolved)
    }

    /// Allocates and creates the directories for `job_id`.
    pub async fn prepare(&self, job_id: &str, requested_output: &str) -> Result<WorkspacePaths, WorkspaceError> {
        let output = self.resolve_output_location(requested_output)?;
        let root = resolve_safe_path(&self.base_dir, job_id)?;
        let paths = WorkspacePaths {
            input: root.join("input"),
            archive: root.join(&self.archive_name),
            root,
            output,
        };

        for dir in [&paths.input, &paths.output] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| WorkspaceError::CreateDirectory {
                    path: dir.clone(),
                    source,
                })?;
        }

        if output_in_use(&paths.output).await {
            // Named folders are shared; a later archive also picks up earlier jobs' files.
            tracing::warn!(
                job_id,
                output = %sanitize::file_name_only(&paths.output),
                "Output folder already contains files"
            );
        }

        tracing::debug!(job_id, "Workspace prepared");
        Ok(paths)
    }

    /// Deletes a job's root directory. Output folders outside the root are
    /// left alone.
    pub async fn discard(&self, paths: &WorkspacePaths) {
        if let Err(e) = tokio::fs::remove_dir_all(&paths.root).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove workspace {}: {}", sanitize::file_name_only(&paths.root), e);
            }
        }
    }
}

async fn output_in_use(dir: &Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

fn is_named_output_folder(raw: &str) -> bool {
    !raw.contains('/') && !raw.contains('\\') && RE_OUTPUT_FOLDER_NAME.is_match(raw)
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        if raw == "~" {
            return home;
        }
        if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}
