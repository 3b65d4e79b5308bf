//! Validation of untrusted relative paths.
//!
//! Every filesystem access driven by a path string that came from outside the
//! process (uploads, scanned trees, retrieval requests) goes through
//! [`resolve_safe_path`].

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::PathError;
use crate::sanitize::file_name_only;

static RE_DRIVE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z]:").unwrap());

/// Normalizes an untrusted relative path into a forward-slash form with no
/// `.`/`..` segments and no duplicate separators.
///
/// Backslashes are accepted as separators. Empty input, `.`, NUL bytes,
/// rooted paths (`/etc`, `C:\x`) and anything that climbs above its root are
/// rejected.
pub fn normalize_relative_path(raw: &str) -> Result<String, PathError> {
    let replaced = raw.replace('\\', "/");
    let replaced = replaced.trim();

    if replaced.is_empty() || replaced == "." || replaced.contains('\0') {
        return Err(PathError::InvalidPath(raw.to_string()));
    }

    if replaced.starts_with('/') || RE_DRIVE_PREFIX.is_match(replaced) {
        return Err(PathError::AbsolutePath(raw.to_string()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in replaced.split('/') {
        match segment {
            "" | "." => continue,
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    if segments.is_empty() || segments[0] == ".." {
        return Err(PathError::Traversal(raw.to_string()));
    }

    Ok(segments.join("/"))
}

/// Resolves `relative` against `root`, failing unless the result is `root`
/// itself or nested beneath it.
pub fn resolve_safe_path(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let normalized = normalize_relative_path(relative)?;
    let resolved_root = absolute_normalized(root)
        .map_err(|_| PathError::InvalidPath(file_name_only(root)))?;

    let mut resolved = resolved_root.clone();
    for segment in normalized.split('/') {
        resolved.push(segment);
    }
    let resolved = lexical_normalize(&resolved);

    // Component-wise prefix check, equivalent to matching on "<root>/".
    if resolved != resolved_root && !resolved.starts_with(&resolved_root) {
        return Err(PathError::PathEscape(normalized));
    }

    Ok(resolved)
}

/// Makes `path` absolute against the current directory and folds away `.`
/// and `..` components without touching the filesystem.
pub(crate) fn absolute_normalized(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    Ok(lexical_normalize(&absolute))
}

pub(crate) fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pops past the root or prefix.
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
