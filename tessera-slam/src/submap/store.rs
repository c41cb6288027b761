//! Ordered collection of finalized submaps.

use crate::submap::{FrameGeometry, LoopClosure, Submap, SubmapId};
use glam::Mat4;
use std::sync::Arc;
use tessera_data::Frame;

/// All submaps of a run, indexed by id (= insertion order).
#[derive(Debug, Default)]
pub struct SubmapStore {
    submaps: Vec<Submap>,
}

impl SubmapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a submap and return its id.
    pub fn insert(
        &mut self,
        frames: Vec<Arc<Frame>>,
        geometry: Vec<FrameGeometry>,
        transform: Mat4,
    ) -> SubmapId {
        let id = self.submaps.len();
        self.submaps.push(Submap {
            id,
            frames,
            geometry,
            transform,
            loop_closures: Vec::new(),
        });
        id
    }

    pub fn attach_loop_closure(&mut self, id: SubmapId, closure: LoopClosure) {
        if let Some(submap) = self.submaps.get_mut(id) {
            submap.loop_closures.push(closure);
        }
    }

    pub fn set_transform(&mut self, id: SubmapId, transform: Mat4) {
        if let Some(submap) = self.submaps.get_mut(id) {
            submap.transform = transform;
        }
    }

    pub fn get(&self, id: SubmapId) -> Option<&Submap> {
        self.submaps.get(id)
    }

    pub fn last(&self) -> Option<&Submap> {
        self.submaps.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Submap> {
        self.submaps.iter()
    }

    pub fn len(&self) -> usize {
        self.submaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submaps.is_empty()
    }

    /// Id the next inserted submap will receive.
    pub fn next_id(&self) -> SubmapId {
        self.submaps.len()
    }

    pub fn loop_closure_count(&self) -> usize {
        self.submaps.iter().map(|s| s.loop_closures.len()).sum()
    }
}
