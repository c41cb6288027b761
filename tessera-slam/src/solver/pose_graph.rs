use crate::solver::{
    FrameDescriptor, LoopCandidate, MapSolver, OptimizationSummary, PoseGraph, PoseGraphConfig,
    SolverError, SubmapInput, TransformModel, align_frames,
};
use crate::submap::{LoopClosure, SubmapId, SubmapStore};
use glam::Mat4;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tessera_data::Frame;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseGraphSolverConfig {
    pub model: TransformModel,
    /// Minimum descriptor similarity for a loop candidate.
    pub loop_min_similarity: f32,
    /// Loop alignments with a larger normalized residual are discarded.
    pub loop_max_residual: f32,
    /// Correspondences used per alignment, most confident first.
    pub max_alignment_points: usize,
    pub graph: PoseGraphConfig,
}

impl Default for PoseGraphSolverConfig {
    fn default() -> Self {
        Self {
            model: TransformModel::Projective,
            loop_min_similarity: 0.9,
            loop_max_residual: 0.1,
            max_alignment_points: 2000,
            graph: PoseGraphConfig::default(),
        }
    }
}

struct Keyframe {
    submap: SubmapId,
    frame: Arc<Frame>,
    descriptor: FrameDescriptor,
}

/// Pose-graph solver: odometry from the carryover frame, loops from
/// thumbnail retrieval, relaxation for optimization.
pub struct PoseGraphSolver {
    config: PoseGraphSolverConfig,
    graph: PoseGraph,
    keyframes: Vec<Keyframe>,
    loops: usize,
}

impl PoseGraphSolver {
    pub fn new(config: PoseGraphSolverConfig) -> Self {
        let graph = PoseGraph::new(config.graph.clone(), config.model);
        Self {
            config,
            graph,
            keyframes: Vec::new(),
            loops: 0,
        }
    }

    pub fn with_model(model: TransformModel) -> Self {
        Self::new(PoseGraphSolverConfig {
            model,
            ..PoseGraphSolverConfig::default()
        })
    }

    pub fn config(&self) -> &PoseGraphSolverConfig {
        &self.config
    }

    pub fn graph(&self) -> &PoseGraph {
        &self.graph
    }
}

impl MapSolver for PoseGraphSolver {
    fn loop_candidates(
        &self,
        store: &SubmapStore,
        frames: &[Arc<Frame>],
        max_loops: usize,
    ) -> Vec<LoopCandidate> {
        if max_loops == 0 {
            return Vec::new();
        }
        // The previous submap shares the carryover frame with this one.
        let next = store.next_id();
        let eligible: Vec<&Keyframe> = self.keyframes.iter().filter(|k| k.submap + 1 < next).collect();
        if eligible.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<LoopCandidate> = Vec::new();
        for query in frames {
            let descriptor = FrameDescriptor::compute(query);
            let best = eligible
                .iter()
                .map(|k| (k, descriptor.similarity(&k.descriptor)))
                .max_by_key(|(_, s)| OrderedFloat(*s));
            if let Some((keyframe, similarity)) = best
                && similarity >= self.config.loop_min_similarity
            {
                matches.push(LoopCandidate {
                    query_frame: query.index,
                    submap: keyframe.submap,
                    frame: Arc::clone(&keyframe.frame),
                    similarity,
                });
            }
        }

        matches.sort_by_key(|c| (std::cmp::Reverse(OrderedFloat(c.similarity)), c.query_frame));
        let mut seen = HashSet::new();
        matches.retain(|c| seen.insert(c.submap));
        matches.truncate(max_loops);
        matches
    }

    fn ingest(&mut self, store: &mut SubmapStore, input: SubmapInput) -> Result<SubmapId, SolverError> {
        let SubmapInput {
            frames,
            geometry,
            candidates,
        } = input;
        let expected = frames.len() + candidates.len();
        if geometry.len() != expected {
            return Err(SolverError::GeometryMismatch {
                expected,
                got: geometry.len(),
            });
        }

        let id = store.next_id();
        let (window, loop_geometry) = geometry.split(frames.len());

        let odometry = match store.last() {
            Some(prev) => {
                let carry = prev.carryover().map(|f| f.index).unwrap_or_default();
                let first = frames.first().map(|f| f.index).unwrap_or_default();
                if carry != first {
                    return Err(SolverError::CarryoverMismatch {
                        expected: carry,
                        found: first,
                    });
                }
                let dst = prev.geometry_for(carry).ok_or(SolverError::MissingGeometry {
                    submap: prev.id,
                    frame: carry,
                })?;
                let src = window.first().ok_or(SolverError::MissingGeometry { submap: id, frame: carry })?;
                let alignment = align_frames(src, dst, self.config.model, self.config.max_alignment_points)
                    .map_err(|source| SolverError::Alignment { submap: id, source })?;
                debug!(
                    submap = id,
                    residual = alignment.residual,
                    correspondences = alignment.correspondences,
                    "Odometry alignment"
                );
                alignment.transform
            }
            None => Mat4::IDENTITY,
        };

        let node = self.graph.add_node(odometry);
        let transform = self.graph.pose(node).unwrap_or(Mat4::IDENTITY);
        let shares_carryover = !store.is_empty();
        let stored_id = store.insert(frames.clone(), window, transform);

        for (candidate, prediction) in candidates.iter().zip(&loop_geometry) {
            let Some(target) = store.get(candidate.submap) else {
                continue;
            };
            let Some(dst) = target.geometry_for(candidate.frame.index) else {
                continue;
            };
            let alignment = match align_frames(
                prediction,
                dst,
                self.config.model,
                self.config.max_alignment_points,
            ) {
                Ok(alignment) => alignment,
                Err(e) => {
                    warn!("Loop {} -> {} rejected: {}", stored_id, candidate.submap, e);
                    continue;
                }
            };
            if alignment.residual > self.config.loop_max_residual {
                warn!(
                    "Loop {} -> {} rejected: residual {:.4}",
                    stored_id, candidate.submap, alignment.residual
                );
                continue;
            }
            if self.graph.add_loop(candidate.submap, stored_id, alignment.transform) {
                store.attach_loop_closure(
                    stored_id,
                    LoopClosure {
                        target: candidate.submap,
                        query_frame: candidate.query_frame,
                        matched_frame: candidate.frame.index,
                        measurement: alignment.transform,
                        similarity: candidate.similarity,
                    },
                );
                self.loops += 1;
                info!(
                    "Loop closure: submap {} -> submap {} (frame {} ~ frame {}, similarity {:.3})",
                    stored_id,
                    candidate.submap,
                    candidate.query_frame,
                    candidate.frame.index,
                    candidate.similarity
                );
            }
        }

        let skip = usize::from(shares_carryover);
        for frame in frames.into_iter().skip(skip) {
            let descriptor = FrameDescriptor::compute(&frame);
            self.keyframes.push(Keyframe {
                submap: stored_id,
                frame,
                descriptor,
            });
        }

        Ok(stored_id)
    }

    fn optimize(&mut self) -> Result<OptimizationSummary, SolverError> {
        self.graph.optimize()
    }

    fn propagate_transforms(&self, store: &mut SubmapStore) {
        for (id, pose) in self.graph.poses().iter().enumerate() {
            store.set_transform(id, *pose);
        }
    }

    fn submap_count(&self) -> usize {
        self.graph.len()
    }

    fn loop_count(&self) -> usize {
        self.loops
    }
}
