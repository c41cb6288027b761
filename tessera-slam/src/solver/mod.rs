//! Global map solving
//!
//! A [`MapSolver`] owns the relationships between submaps: it proposes loop
//! candidates for an incoming submap, ingests the submap with its odometry
//! and loop constraints, optimizes the whole graph and writes the resulting
//! transforms back into the [`SubmapStore`](crate::submap::SubmapStore).

pub mod alignment;
pub mod descriptor;
pub mod graph;
mod pose_graph;

pub use alignment::{Alignment, AlignmentError, align_frames};
pub use descriptor::FrameDescriptor;
pub use graph::{PoseGraph, PoseGraphConfig};
pub use pose_graph::{PoseGraphSolver, PoseGraphSolverConfig};

use crate::submap::{SubmapGeometry, SubmapId, SubmapStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_data::Frame;
use thiserror::Error;

/// Family of transforms relating submaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformModel {
    /// Rotation, translation and uniform scale.
    Similarity,
    /// Full 4x4 projective map.
    Projective,
}

impl TransformModel {
    pub fn from_similarity_flag(use_similarity: bool) -> Self {
        if use_similarity {
            TransformModel::Similarity
        } else {
            TransformModel::Projective
        }
    }
}

/// An earlier keyframe that looks like a frame of the incoming submap.
#[derive(Debug, Clone)]
pub struct LoopCandidate {
    /// Frame of the incoming submap that issued the query.
    pub query_frame: usize,
    /// Submap holding the matched frame.
    pub submap: SubmapId,
    pub frame: Arc<Frame>,
    pub similarity: f32,
}

/// Everything the solver needs to insert one submap.
///
/// `geometry` holds one prediction per entry of `frames` followed by one per
/// candidate, in that order.
#[derive(Debug, Clone)]
pub struct SubmapInput {
    pub frames: Vec<Arc<Frame>>,
    pub geometry: SubmapGeometry,
    pub candidates: Vec<LoopCandidate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OptimizationSummary {
    pub iterations: usize,
    /// Largest loop residual after optimization.
    pub residual: f32,
    pub loop_edges: usize,
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Expected {expected} predictions, got {got}")]
    GeometryMismatch { expected: usize, got: usize },

    #[error("Submap must start with carryover frame {expected}, found {found}")]
    CarryoverMismatch { expected: usize, found: usize },

    #[error("No geometry for frame {frame} in submap {submap}")]
    MissingGeometry { submap: SubmapId, frame: usize },

    #[error("Could not align submap {submap}: {source}")]
    Alignment {
        submap: SubmapId,
        #[source]
        source: AlignmentError,
    },

    #[error("Pose graph diverged")]
    Diverged,

    #[error("Pose graph did not converge (residual {residual:.4})")]
    NotConverged { residual: f32 },
}

/// Maintains global submap relationships.
pub trait MapSolver {
    /// Earlier keyframes resembling `frames`, best first, at most `max_loops`.
    fn loop_candidates(
        &self,
        store: &SubmapStore,
        frames: &[Arc<Frame>],
        max_loops: usize,
    ) -> Vec<LoopCandidate>;

    /// Insert a submap into `store` along with its graph constraints.
    fn ingest(&mut self, store: &mut SubmapStore, input: SubmapInput) -> Result<SubmapId, SolverError>;

    fn optimize(&mut self) -> Result<OptimizationSummary, SolverError>;

    /// Write the optimized transform of every submap into `store`.
    fn propagate_transforms(&self, store: &mut SubmapStore);

    fn submap_count(&self) -> usize;

    fn loop_count(&self) -> usize;
}
