//! Camera trajectory and submap transforms, serialized as JSON next to the scene.

use crate::error::DataError;
use crate::types::CameraPose;
use glam::Mat4;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Global transform of one submap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmapRecord {
    pub id: usize,
    /// Stream indices of the submap's keyframes, in order.
    pub frames: Vec<usize>,
    /// World-from-submap transform, column-major.
    pub transform: [f32; 16],
}

impl SubmapRecord {
    pub fn new(id: usize, frames: Vec<usize>, transform: Mat4) -> Self {
        Self {
            id,
            frames,
            transform: transform.to_cols_array(),
        }
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_cols_array(&self.transform)
    }
}

/// World pose of one keyframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub frame: usize,
    pub submap: usize,
    pub path: PathBuf,
    pub position: [f32; 3],
    /// Quaternion (x, y, z, w).
    pub rotation: [f32; 4],
}

impl CameraRecord {
    pub fn new(frame: usize, submap: usize, path: PathBuf, pose: CameraPose) -> Self {
        Self {
            frame,
            submap,
            path,
            position: pose.position.to_array(),
            rotation: pose.rotation.to_array(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub submaps: Vec<SubmapRecord>,
    pub cameras: Vec<CameraRecord>,
    pub loop_closures: usize,
}

impl Trajectory {
    pub fn write(&self, path: &Path) -> Result<(), DataError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, DataError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
