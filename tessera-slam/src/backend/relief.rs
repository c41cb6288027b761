//! Stand-in backend for dry runs without a learned model.

use crate::backend::{GeometryBackend, InferenceError};
use crate::submap::{FrameGeometry, SubmapGeometry};
use glam::{Mat4, Vec3};
use image::RgbImage;
use std::sync::Arc;
use tessera_data::Frame;

#[derive(Debug, Clone, Copy)]
pub struct ReliefConfig {
    /// Pixel step between sampled points.
    pub stride: u32,
    /// Depth of a black pixel.
    pub base_depth: f32,
    /// Extra depth of a white pixel.
    pub relief: f32,
    /// Distance between consecutive cameras of one call, along the optical axis.
    pub frame_spacing: f32,
}

impl Default for ReliefConfig {
    fn default() -> Self {
        Self {
            stride: 8,
            base_depth: 1.0,
            relief: 0.5,
            frame_spacing: 0.05,
        }
    }
}

/// Unprojects every sampled pixel through a pinhole camera (focal length =
/// image width) at a depth driven by its brightness.
///
/// Cameras of one call advance along +Z starting at the origin; confidence is
/// the local intensity gradient. Output is deterministic, which makes the
/// whole pipeline reproducible, but it is not metric geometry.
#[derive(Debug, Clone, Default)]
pub struct ReliefBackend {
    config: ReliefConfig,
}

impl ReliefBackend {
    pub fn new(config: ReliefConfig) -> Self {
        Self { config }
    }

    fn luma(image: &RgbImage, x: u32, y: u32) -> f32 {
        let [r, g, b] = image.get_pixel(x, y).0;
        0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
    }

    fn frame_geometry(&self, frame: &Frame, camera_pose: Mat4) -> FrameGeometry {
        let image = &frame.image;
        let (w, h) = image.dimensions();
        let stride = self.config.stride.max(1);
        let focal = w.max(1) as f32;
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);

        let capacity = (w.div_ceil(stride) * h.div_ceil(stride)) as usize;
        let mut points = Vec::with_capacity(capacity);
        let mut colors = Vec::with_capacity(capacity);
        let mut confidence = Vec::with_capacity(capacity);

        for y in (0..h).step_by(stride as usize) {
            for x in (0..w).step_by(stride as usize) {
                let value = Self::luma(image, x, y);
                let depth = self.config.base_depth + self.config.relief * value / 255.0;
                let camera_point = Vec3::new(
                    (x as f32 - cx) / focal * depth,
                    (y as f32 - cy) / focal * depth,
                    depth,
                );

                let gx = Self::luma(image, (x + 1).min(w - 1), y) - Self::luma(image, x.saturating_sub(1), y);
                let gy = Self::luma(image, x, (y + 1).min(h - 1)) - Self::luma(image, x, y.saturating_sub(1));

                points.push(camera_pose.transform_point3(camera_point));
                colors.push(image.get_pixel(x, y).0);
                confidence.push(1.0 + (gx * gx + gy * gy).sqrt() / 255.0);
            }
        }

        FrameGeometry {
            frame: frame.index,
            camera_pose,
            points,
            colors,
            confidence,
        }
    }
}

impl GeometryBackend for ReliefBackend {
    fn predict(&self, frames: &[Arc<Frame>]) -> Result<SubmapGeometry, InferenceError> {
        if let Some(frame) = frames.iter().find(|f| f.image.width() == 0 || f.image.height() == 0) {
            return Err(InferenceError::Failed(format!("frame {} has no pixels", frame.index)));
        }

        let predictions = frames
            .iter()
            .enumerate()
            .map(|(position, frame)| {
                let offset = Vec3::new(0.0, 0.0, position as f32 * self.config.frame_spacing);
                self.frame_geometry(frame, Mat4::from_translation(offset))
            })
            .collect();
        Ok(SubmapGeometry::new(predictions))
    }
}
