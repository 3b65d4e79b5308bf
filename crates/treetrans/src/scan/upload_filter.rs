/// Directory segments that disqualify an uploaded path.
const IGNORED_UPLOAD_SEGMENTS: &[&str] = &[".git", "node_modules", ".next", ".turbo", "dist", "build"];

/// Returns true when an uploaded relative path should be dropped before
/// staging, either because it is empty or because any of its segments is an
/// ignored directory name.
pub fn should_ignore_upload_path(relative_path: &str) -> bool {
    let normalized = relative_path.replace('\\', "/");
    let normalized = normalized.trim().trim_start_matches('/');

    if normalized.is_empty() {
        return true;
    }

    normalized
        .split('/')
        .filter(|segment| !segment.is_empty())
        .any(|segment| IGNORED_UPLOAD_SEGMENTS.contains(&segment))
}
