//! `Content-Disposition` construction for forced downloads.
//!
//! The quoted `filename=` parameter only carries printable ASCII: `\` and `"` are
//! backslash-escaped, control characters and non-ASCII characters become `_`. When the name
//! contains non-ASCII characters the exact name is also sent as an RFC 5987 `filename*`
//! parameter, which clients prefer when they understand it.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// RFC 5987 `attr-char` minus alphanumerics: these are left unencoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Build an `attachment` disposition for `filename`.
pub fn content_disposition(filename: &str) -> String {
    let mut fallback = String::with_capacity(filename.len());
    for c in filename.chars() {
        match c {
            '"' | '\\' => {
                fallback.push('\\');
                fallback.push(c);
            }
            c if c.is_ascii_control() || !c.is_ascii() => fallback.push('_'),
            c => fallback.push(c),
        }
    }

    if filename.is_ascii() {
        return format!("attachment; filename=\"{}\"", fallback);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(filename, ATTR_CHAR)
    )
}
