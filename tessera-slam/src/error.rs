//! Run-level errors.

use crate::backend::InferenceError;
use crate::config::ConfigError;
use crate::export::ExportError;
use crate::orchestrator::RunState;
use crate::solver::SolverError;
use crate::submap::SubmapId;
use std::path::PathBuf;
use tessera_capture::CaptureError;
use thiserror::Error;

/// Coarse failure category, stable across error message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Input,
    Decode,
    Inference,
    Optimization,
    Export,
    Config,
    Workspace,
    Cancelled,
    State,
}

#[derive(Debug, Error)]
pub enum SlamError {
    #[error("No valid images found in {} (expected .jpg, .jpeg or .png files)", .0.display())]
    NoValidImages(PathBuf),

    #[error("None of the input images could be decoded")]
    NoDecodableFrames,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Inference failed for submap {submap}: {source}")]
    Inference {
        submap: SubmapId,
        #[source]
        source: InferenceError,
    },

    #[error("Optimization failed at submap {submap}: {source}")]
    Optimization {
        submap: SubmapId,
        #[source]
        source: SolverError,
    },

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Cancelled after {0} submaps")]
    Cancelled(usize),

    #[error("Orchestrator cannot run from state {0:?}")]
    InvalidState(RunState),
}

impl SlamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SlamError::NoValidImages(_) | SlamError::NoDecodableFrames => ErrorKind::Input,
            SlamError::Capture(e) if e.is_frame_local() => ErrorKind::Decode,
            SlamError::Capture(CaptureError::WorkspaceBusy(_) | CaptureError::WorkspaceOverlap { .. }) => {
                ErrorKind::Workspace
            }
            SlamError::Capture(_) => ErrorKind::Input,
            SlamError::Inference { .. } => ErrorKind::Inference,
            SlamError::Optimization { .. } => ErrorKind::Optimization,
            SlamError::Export(_) => ErrorKind::Export,
            SlamError::Config(_) => ErrorKind::Config,
            SlamError::Cancelled(_) => ErrorKind::Cancelled,
            SlamError::InvalidState(_) => ErrorKind::State,
        }
    }
}
