//! Common capture source types and traits.

use std::path::PathBuf;
use tessera_data::Frame;
use thiserror::Error;

/// Errors that can occur during capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Workspace {0} is already in use by another run")]
    WorkspaceBusy(PathBuf),

    #[error("Workspace {workspace} overlaps input directory {input}")]
    WorkspaceOverlap { workspace: PathBuf, input: PathBuf },

    #[error("Failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Whether the error concerns a single frame and the stream can continue.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, CaptureError::Decode { .. })
    }
}

/// Trait for capture sources that provide an ordered stream of frames.
///
/// A frame-local error (see [`CaptureError::is_frame_local`]) consumes the
/// offending frame: the next call continues with the following one.
pub trait CaptureSource {
    /// Get the next frame from the source. Returns `None` when the stream ends.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Number of frames not yet returned, if known.
    fn remaining(&self) -> Option<usize>;

    /// Check if the source is still active.
    fn is_active(&self) -> bool;

    /// Stop capturing.
    fn stop(&mut self);
}
