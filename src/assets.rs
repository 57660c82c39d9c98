//! Enumeration of public asset files by extension

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lowercase an extension and drop surrounding whitespace and a leading dot
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// List files under `root` whose extension is in `extensions`
///
/// Paths are returned as site-relative URLs under `url_prefix`, sorted, with
/// forward slashes regardless of platform. A missing `root` yields an empty
/// list.
///
/// # Arguments
/// * `root` - Directory the public assets are served from
/// * `url_prefix` - URL path segment `root` is mounted under, e.g. `_resources`
/// * `extensions` - Extensions to match, case-insensitive, with or without a dot
pub fn public_files_by_extension(
    root: &Path,
    url_prefix: &str,
    extensions: &[String],
) -> Result<Vec<String>> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|e| normalize_extension(e))
        .filter(|e| !e.is_empty())
        .collect();

    if wanted.is_empty() || !root.is_dir() {
        return Ok(Vec::new());
    }

    let prefix = url_prefix.trim_matches('/');
    let mut files = Vec::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| wanted.contains(&e.to_ascii_lowercase()))
                .unwrap_or(false);
            if !matches {
                continue;
            }

            let relative = match path.strip_prefix(root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let joined = segments.join("/");

            if prefix.is_empty() {
                files.push(format!("/{}", joined));
            } else {
                files.push(format!("/{}/{}", prefix, joined));
            }
        }
    }

    files.sort();
    debug!(
        "Found {} public files under {} for extensions={:?}",
        files.len(),
        root.display(),
        wanted
    );
    Ok(files)
}
