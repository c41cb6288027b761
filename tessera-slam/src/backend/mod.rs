//! Geometry prediction backends
//!
//! The learned model that predicts per-frame geometry lives outside this
//! crate. It is reached through [`GeometryBackend`] and shared through a
//! [`ModelHandle`] that loads it once per process.

mod handle;
mod relief;

pub use handle::ModelHandle;
pub use relief::{ReliefBackend, ReliefConfig};

use crate::submap::SubmapGeometry;
use std::sync::Arc;
use tessera_data::Frame;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model failed to load: {0}")]
    Load(String),

    #[error("Transient backend failure: {0}")]
    Transient(String),

    #[error("Backend failure: {0}")]
    Failed(String),

    #[error("Backend returned {got} predictions for {expected} frames")]
    FrameCountMismatch { expected: usize, got: usize },
}

impl InferenceError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, InferenceError::Transient(_))
    }
}

/// Predicts geometry for a group of frames.
///
/// Deterministic for identical weights and inputs, with no side effects
/// beyond the returned value. Implementations return one prediction per
/// input frame, in input order, in a coordinate frame anchored at the first
/// input frame.
pub trait GeometryBackend {
    fn predict(&self, frames: &[Arc<Frame>]) -> Result<SubmapGeometry, InferenceError>;
}
