use std::path::Path;

/// Number of leading bytes inspected by [`looks_like_text`].
const TEXT_SAMPLE_BYTES: usize = 8000;

/// Returns true when `relative_path` has an allow-listed extension and its
/// size does not exceed `max_bytes`.
///
/// `allowed_extensions` is expected in normalized form (`.md`, lowercase).
pub fn is_eligible_for_transform(
    relative_path: &str,
    allowed_extensions: &[String],
    max_bytes: u64,
    actual_bytes: u64,
) -> bool {
    let Some(extension) = Path::new(relative_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
    else {
        return false;
    };

    allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
        && actual_bytes <= max_bytes
}

/// Binary sniffing heuristic: a buffer is text when fewer than 3% of its
/// first 8000 bytes are NUL or non-whitespace control characters.
pub fn looks_like_text(buffer: &[u8]) -> bool {
    if buffer.is_empty() {
        return true;
    }

    let sample = &buffer[..buffer.len().min(TEXT_SAMPLE_BYTES)];
    let suspicious = sample
        .iter()
        .filter(|&&byte| byte < 9 || (14..32).contains(&byte))
        .count();

    // suspicious / len < 0.03 without floating point
    suspicious * 100 < sample.len() * 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec![".md".to_string(), ".txt".to_string()]
    }

    #[test]
    fn test_eligibility_by_extension_and_size() {
        assert!(is_eligible_for_transform("docs/readme.md", &allowed(), 100, 5));
        assert!(!is_eligible_for_transform("src/index.ts", &allowed(), 100, 5));
        assert!(!is_eligible_for_transform("docs/readme.md", &allowed(), 100, 200));
    }

    #[test]
    fn test_size_boundaries() {
        assert!(is_eligible_for_transform("a.md", &allowed(), 100, 100));
        assert!(!is_eligible_for_transform("a.md", &allowed(), 100, 101));
        assert!(is_eligible_for_transform("a.md", &allowed(), 0, 0));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert!(is_eligible_for_transform("README.MD", &allowed(), 100, 1));
        assert!(is_eligible_for_transform("notes.Txt", &allowed(), 100, 1));
    }

    #[test]
    fn test_files_without_extension_are_not_eligible() {
        assert!(!is_eligible_for_transform("Makefile", &allowed(), 100, 1));
        assert!(!is_eligible_for_transform(".md", &allowed(), 100, 1));
        assert!(!is_eligible_for_transform("docs.md/LICENSE", &allowed(), 100, 1));
    }

    #[test]
    fn test_empty_buffer_is_text() {
        assert!(looks_like_text(b""));
    }

    #[test]
    fn test_plain_text_and_whitespace_controls() {
        assert!(looks_like_text(b"Hello world\n\tindented\r\n"));
        assert!(looks_like_text("繁體中文內容".as_bytes()));
        // Form feed and vertical tab are whitespace, not suspicious.
        assert!(looks_like_text(b"page\x0cbreak\x0b"));
    }

    #[test]
    fn test_binary_buffers_are_rejected() {
        assert!(!looks_like_text(&[0u8; 64]));
        assert!(!looks_like_text(b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR"));
    }

    #[test]
    fn test_threshold_is_three_percent() {
        // 2 suspicious bytes in 100 -> 2% -> text
        let mut buffer = vec![b'a'; 100];
        buffer[0] = 0;
        buffer[1] = 1;
        assert!(looks_like_text(&buffer));

        // 3 suspicious bytes in 100 -> 3% -> binary
        buffer[2] = 2;
        assert!(!looks_like_text(&buffer));
    }

    #[test]
    fn test_only_first_sample_is_inspected() {
        let mut buffer = vec![b'a'; TEXT_SAMPLE_BYTES];
        buffer.extend(std::iter::repeat(0u8).take(10_000));
        assert!(looks_like_text(&buffer));
    }
}
