//! Helpers for keeping uploaded file details out of logs and off the filesystem.
//!
//! Uploaded filenames are caller-controlled, so they are never joined onto a
//! directory as-is, and spans only ever carry the final path component.

use std::path::Path;

/// The last path component, for log fields. Directories are never shown.
pub fn redact_path(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => String::from("<no file name>"),
    }
}

/// Reduces a caller-supplied filename to something safe to embed in a temp file name.
///
/// Directory components are dropped and anything outside `[A-Za-z0-9._-]`
/// becomes `_`. An input that reduces to nothing yields `"upload"`.
pub fn safe_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim_start_matches('.');

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Lowercased extension of a caller-supplied filename, without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}
