//! Core data types for frames, scene points and camera poses.
//!
//! These are CPU-side representations shared by capture, mapping and export.

use glam::{Mat4, Quat, Vec3};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// A decoded input image with its position in the raw stream.
///
/// Frames are immutable once read and are shared behind `Arc` by the
/// submap window, finalized submaps and loop-closure candidates.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the raw (sorted) input stream. Defines the total order.
    pub index: usize,
    /// Source file the frame was decoded from.
    pub path: PathBuf,
    /// RGB pixels.
    pub image: RgbImage,
}

impl Frame {
    /// Create a new frame.
    pub fn new(index: usize, path: impl Into<PathBuf>, image: RgbImage) -> Self {
        Self {
            index,
            path: path.into(),
            image,
        }
    }

    /// Get image dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// File name of the source image, for log lines.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<unnamed>")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A colored point in world or submap space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenePoint {
    pub position: Vec3,
    /// 8-bit sRGB color.
    pub color: [u8; 3],
}

impl ScenePoint {
    pub fn new(position: Vec3, color: [u8; 3]) -> Self {
        Self { position, color }
    }

    /// Create a white point at the given position.
    pub fn white(position: Vec3) -> Self {
        Self {
            position,
            color: [255, 255, 255],
        }
    }
}

impl Default for ScenePoint {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: [204, 204, 204],
        }
    }
}

/// Camera center and orientation in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl CameraPose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Extract the pose from a camera-to-world transform.
    ///
    /// Projective transforms are handled by mapping the camera center through
    /// the full matrix and taking the orientation from the normalized upper
    /// 3x3 block.
    pub fn from_transform(world_from_camera: Mat4) -> Self {
        let position = world_from_camera.project_point3(Vec3::ZERO);
        let axes = glam::Mat3::from_mat4(world_from_camera);
        let x = axes.x_axis.normalize_or_zero();
        let y = axes.y_axis.normalize_or_zero();
        let z = axes.z_axis.normalize_or_zero();
        let rotation = if x == Vec3::ZERO || y == Vec3::ZERO || z == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            Quat::from_mat3(&glam::Mat3::from_cols(x, y, z)).normalize()
        };
        Self { position, rotation }
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}
