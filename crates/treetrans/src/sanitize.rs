//! Helpers for keeping credentials and host paths out of logs.

use std::path::Path;

use url::Url;

/// Returns only the final component of a path.
pub fn file_name_only(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks any userinfo (tokens, passwords) embedded in a repository URL.
///
/// Strings that do not parse as URLs are returned with everything before the
/// last `@` masked.
pub fn redact_repo_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.username().is_empty() && url.password().is_none() {
                return url.to_string();
            }
            // Only fails for cannot-be-a-base URLs, which carry no userinfo.
            let _ = url.set_username("****");
            let _ = url.set_password(None);
            url.to_string()
        }
        Err(_) => match raw.rfind('@') {
            Some(at) => format!("****{}", &raw[at..]),
            None => raw.to_string(),
        },
    }
}
