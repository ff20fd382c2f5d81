//! Finds photo files on disk for the command-line driver.

use anyhow::{bail, Result};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions of the configured formats, e.g. "jpeg" also yields "jpg".
pub fn extensions_for(formats: &[String]) -> Vec<String> {
    let mut extensions: Vec<String> = formats
        .iter()
        .filter_map(|name| ImageFormat::from_extension(name))
        .flat_map(|format| format.extensions_str().iter().map(|e| e.to_string()))
        .collect();
    extensions.sort();
    extensions.dedup();
    extensions
}

pub fn discover_images(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        bail!("not a directory: {}", directory.display());
    }

    let mut images = Vec::new();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension() else {
            continue;
        };
        let ext_lower = ext.to_string_lossy().to_lowercase();
        if extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext_lower)) {
            images.push(path.to_path_buf());
        }
    }

    // Sorted so sends happen in a stable order
    images.sort();

    Ok(images)
}
