// This is free and unencumbered software released into the public domain.

//! Capture file placement under the platform picture directory.

use chrono::Local;
use std::path::{Path, PathBuf};

/// Folder under the platform picture directory where captures land.
const CAPTURE_FOLDER: &str = "Camera";

pub fn default_capture_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(CAPTURE_FOLDER)
}

/// Resolve the path a capture should be written to.
///
/// An absolute `file_name` is used as-is; a relative one lands under
/// [`default_capture_dir`]; an empty one gets a collision-free
/// timestamped name there.
pub fn next_capture_path(file_name: &str) -> PathBuf {
    let trimmed = file_name.trim();
    if !trimmed.is_empty() {
        let path = Path::new(trimmed);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        return default_capture_dir().join(path);
    }
    unique_timestamped_path(&default_capture_dir())
}

fn unique_timestamped_path(dir: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let first = dir.join(format!("IMG_{stamp}.jpg"));
    if !first.exists() {
        return first;
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("IMG_{stamp}_{n}.jpg"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
