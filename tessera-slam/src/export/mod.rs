//! Scene export
//!
//! A [`SceneExporter`] turns the optimized submaps into the run's artifact.
//! [`PlyExporter`] writes a colored point cloud plus a JSON trajectory.

mod ply_exporter;

pub use ply_exporter::{PlyExporter, SCENE_FILE, TRAJECTORY_FILE};

use crate::submap::SubmapStore;
use std::path::PathBuf;
use tessera_data::DataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write scene: {0}")]
    Data(#[from] DataError),

    #[error("No submaps to export")]
    EmptyScene,
}

pub trait SceneExporter {
    /// Rebuild the world-space scene from the current submap transforms.
    fn refresh(&mut self, store: &SubmapStore) -> Result<(), ExportError>;

    /// Write the scene built by the last refresh and return the artifact path.
    fn export(&mut self, loop_closures: usize) -> Result<PathBuf, ExportError>;
}
