//! Image discovery and stream ordering.

use crate::source::CaptureError;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Paths containing this marker hold depth maps, not color frames.
const DEPTH_MARKER: &str = "depth";

/// Whether `path` names a color image that belongs in the frame stream.
pub fn is_candidate_image(path: &Path) -> bool {
    let lowered = path.to_string_lossy().to_lowercase();
    if lowered.contains(DEPTH_MARKER) {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// The first number in a file name, with an optional fractional part.
///
/// `frame_0012.png` gives 12, `1403636579.763555.png` gives 1403636579.763555.
pub fn numeric_key(path: &Path) -> Option<f64> {
    let name = path.file_name()?.to_str()?;
    let bytes = name.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;

    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    name[start..end].parse().ok()
}

fn stream_order(a: &PathBuf, b: &PathBuf) -> Ordering {
    match (numeric_key(a), numeric_key(b)) {
        (Some(ka), Some(kb)) => ka.total_cmp(&kb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Recursively collect candidate images under `root`, in stream order.
///
/// An empty result is not an error here; callers decide how to report it.
#[tracing::instrument(skip_all, fields(root = %root.display()))]
pub fn discover_images(root: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| CaptureError::Walk {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if is_candidate_image(relative) {
            paths.push(entry.into_path());
        } else {
            debug!("Ignoring {}", entry.path().display());
        }
    }

    paths.sort_by(stream_order);
    info!("Found {} images to process", paths.len());
    Ok(paths)
}
