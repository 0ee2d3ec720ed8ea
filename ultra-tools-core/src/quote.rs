// ultra-tools-core/src/quote.rs

//! Quoting of path arguments interpolated into shell command lines.
//!
//! Paths come from app storage and may contain spaces or metacharacters, so
//! every path is single-quoted; an embedded `'` closes the quote, emits a
//! double-quoted `'`, and reopens it.

use crate::errors::InstallError;
use std::path::Path;

/// Single-quotes `text` for POSIX `sh`.
pub fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    quoted.push_str(&text.replace('\'', r#"'"'"'"#));
    quoted.push('\'');
    quoted
}

/// Single-quotes a path. Non-UTF-8 paths are rejected rather than mangled.
pub fn quote_str(path: impl AsRef<Path>) -> Result<String, InstallError> {
    let path = path.as_ref();
    path.to_str()
        .map(quote)
        .ok_or_else(|| InstallError::InvalidPath(path.to_path_buf()))
}
