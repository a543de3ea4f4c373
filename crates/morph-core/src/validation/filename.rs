//! Filename sanitizing for caller-supplied upload names.
//!
//! The multipart filename is untrusted: it may carry directory components from either path
//! convention, control characters, or nothing at all. Only the final component survives and
//! everything outside `[A-Za-z0-9._-]` is replaced.

pub const MAX_FILENAME_LENGTH: usize = 255;
pub const FALLBACK_UPLOAD_FILENAME: &str = "image.png";

/// Reduce an untrusted upload filename to a safe single path component.
///
/// Never fails: names that sanitize to nothing useful (empty, `.`, `..`) become
/// [`FALLBACK_UPLOAD_FILENAME`].
pub fn sanitize_upload_filename(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("");

    let mut cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // ASCII only at this point, so byte truncation is char-safe
    cleaned.truncate(MAX_FILENAME_LENGTH);

    if cleaned.chars().all(|c| c == '.') {
        return FALLBACK_UPLOAD_FILENAME.to_string();
    }

    cleaned
}
