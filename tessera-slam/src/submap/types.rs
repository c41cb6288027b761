//! Submap data: frames, predicted geometry and the global transform.

use glam::{Mat4, Vec3};
use std::sync::Arc;
use tessera_data::Frame;

pub type SubmapId = usize;

/// Geometry predicted for one frame, in the coordinates of the submap it was
/// predicted with.
///
/// `points`, `colors` and `confidence` are parallel and follow the same pixel
/// sampling for every prediction of a given image, so two predictions of the
/// same frame correspond point by point.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameGeometry {
    /// Stream index of the frame.
    pub frame: usize,
    /// Camera-to-submap transform.
    pub camera_pose: Mat4,
    pub points: Vec<Vec3>,
    pub colors: Vec<[u8; 3]>,
    pub confidence: Vec<f32>,
}

impl FrameGeometry {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Backend output for one inference call, one entry per input frame in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmapGeometry {
    pub frames: Vec<FrameGeometry>,
}

impl SubmapGeometry {
    pub fn new(frames: Vec<FrameGeometry>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Split into the first `window` predictions and the rest.
    pub fn split(mut self, window: usize) -> (Vec<FrameGeometry>, Vec<FrameGeometry>) {
        let rest = self.frames.split_off(window.min(self.frames.len()));
        (self.frames, rest)
    }
}

/// A non-sequential constraint attached to the submap that detected it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopClosure {
    /// Earlier submap the loop closes onto.
    pub target: SubmapId,
    /// Frame of the new submap whose retrieval found the loop.
    pub query_frame: usize,
    /// Frame of `target` that was matched.
    pub matched_frame: usize,
    /// Maps this submap's coordinates into `target`'s coordinates.
    pub measurement: Mat4,
    pub similarity: f32,
}

/// A finalized, ordered slice of keyframes with its geometry.
///
/// The frame set never changes after creation; `transform` is rewritten every
/// time the pose graph is re-optimized.
#[derive(Debug, Clone)]
pub struct Submap {
    pub id: SubmapId,
    pub frames: Vec<Arc<Frame>>,
    pub geometry: Vec<FrameGeometry>,
    /// World-from-submap transform.
    pub transform: Mat4,
    pub loop_closures: Vec<LoopClosure>,
}

impl Submap {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_indices(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.index).collect()
    }

    /// The frame shared with the next submap.
    pub fn carryover(&self) -> Option<&Arc<Frame>> {
        self.frames.last()
    }

    pub fn geometry_for(&self, frame: usize) -> Option<&FrameGeometry> {
        self.geometry.iter().find(|g| g.frame == frame)
    }

    /// Camera-to-world transform of a keyframe under the current submap transform.
    pub fn world_camera_pose(&self, frame: usize) -> Option<Mat4> {
        self.geometry_for(frame)
            .map(|g| self.transform * g.camera_pose)
    }
}
