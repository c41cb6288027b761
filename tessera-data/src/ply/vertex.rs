//! PLY vertex records

use crate::types::ScenePoint;
use bytemuck::{Pod, Zeroable};

/// One vertex as laid out in the binary body of an exported PLY file:
/// `float x, float y, float z, uchar red, uchar green, uchar blue`.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PlyVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl From<&ScenePoint> for PlyVertex {
    fn from(point: &ScenePoint) -> Self {
        Self {
            x: point.position.x,
            y: point.position.y,
            z: point.position.z,
            red: point.color[0],
            green: point.color[1],
            blue: point.color[2],
        }
    }
}
