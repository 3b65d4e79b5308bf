use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use url::Url;

use crate::error::WorkspaceError;
use crate::sanitize;

/// Accepts only public `https://github.com/<owner>/<repo>` URLs and returns
/// the canonical `https://github.com/<owner>/<repo>.git` form.
pub fn normalize_github_url(raw: &str) -> Result<String, WorkspaceError> {
    let url = Url::parse(raw.trim())
        .map_err(|_| WorkspaceError::InvalidRepository("Invalid GitHub repository URL".to_string()))?;

    if url.scheme() != "https" || url.host_str() != Some("github.com") {
        return Err(WorkspaceError::InvalidRepository(
            "Only public https://github.com repositories are supported".to_string(),
        ));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    let [owner, repo] = segments.as_slice() else {
        return Err(WorkspaceError::InvalidRepository(
            "Repository URL must be in /owner/repo format".to_string(),
        ));
    };

    let (owner, repo) = (*owner, *repo);
    let repo = match repo.len().checked_sub(4).and_then(|cut| repo.get(cut..)) {
        Some(tail) if tail.eq_ignore_ascii_case(".git") => &repo[..repo.len() - 4],
        _ => repo,
    };
    if repo.is_empty() {
        return Err(WorkspaceError::InvalidRepository(
            "Repository URL must be in /owner/repo format".to_string(),
        ));
    }

    Ok(format!("https://github.com/{}/{}.git", owner, repo))
}

/// Shallow-clones `url` into `<input_root>/repo` and returns that path.
///
/// The git process is killed when `timeout_secs` elapses.
pub async fn clone_repository(url: &str, input_root: &Path, timeout_secs: u64) -> Result<PathBuf, WorkspaceError> {
    let target = input_root.join("repo");
    let redacted = sanitize::redact_repo_url(url);
    tracing::info!(repo = %redacted, "Cloning repository");

    let mut cmd = Command::new("git");
    cmd.args(["clone", "--depth=1"])
        .arg(url)
        .arg(&target)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| WorkspaceError::CloneFailed(format!("Failed to run git: {}", e)))?;

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
        .await
        .map_err(|_| {
            tracing::warn!(repo = %redacted, timeout_secs, "Clone timed out");
            WorkspaceError::CloneTimeout(timeout_secs)
        })?
        .map_err(|e| WorkspaceError::CloneFailed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WorkspaceError::CloneFailed(stderr.trim().to_string()));
    }

    Ok(target)
}
