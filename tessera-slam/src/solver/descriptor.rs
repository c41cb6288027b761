//! Global image descriptors for loop retrieval.

use image::imageops::{self, FilterType};
use tessera_data::Frame;

pub const DESCRIPTOR_WIDTH: u32 = 16;
pub const DESCRIPTOR_HEIGHT: u32 = 12;

/// Zero-mean, unit-norm grayscale thumbnail.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDescriptor {
    values: Vec<f32>,
}

impl FrameDescriptor {
    pub fn compute(frame: &Frame) -> Self {
        let gray = imageops::grayscale(&frame.image);
        let thumb = imageops::resize(&gray, DESCRIPTOR_WIDTH, DESCRIPTOR_HEIGHT, FilterType::Triangle);

        let mut values: Vec<f32> = thumb.pixels().map(|p| p.0[0] as f32).collect();
        let mean = values.iter().sum::<f32>() / values.len().max(1) as f32;
        values.iter_mut().for_each(|v| *v -= mean);
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            values.iter_mut().for_each(|v| *v /= norm);
        }
        Self { values }
    }

    /// Cosine similarity in [-1, 1]; 0 when either image is flat.
    pub fn similarity(&self, other: &FrameDescriptor) -> f32 {
        self.values.iter().zip(&other.values).map(|(a, b)| a * b).sum()
    }
}
