//! Pose graph over submap transforms.

use crate::solver::{OptimizationSummary, SolverError, TransformModel};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for pose graph optimization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseGraphConfig {
    /// Maximum relaxation sweeps over the loop edges.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Sweeps stop once every loop residual is below this.
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f32,

    /// Fraction of each loop correction applied per sweep.
    #[serde(default = "default_relaxation")]
    pub relaxation: f32,

    /// Largest loop residual accepted after the last sweep.
    #[serde(default = "default_max_residual")]
    pub max_residual: f32,
}

fn default_max_iterations() -> usize {
    20
}

fn default_convergence_threshold() -> f32 {
    1e-4
}

fn default_relaxation() -> f32 {
    0.5
}

fn default_max_residual() -> f32 {
    1.0
}

impl Default for PoseGraphConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            relaxation: default_relaxation(),
            max_residual: default_max_residual(),
        }
    }
}

/// Loop closure edge between non-consecutive submaps.
#[derive(Clone, Debug)]
pub struct LoopEdge {
    /// Older submap.
    pub from_idx: usize,
    /// Newer submap.
    pub to_idx: usize,
    /// Maps `to_idx` coordinates into `from_idx` coordinates.
    pub measurement: Mat4,
}

/// Chain of submap transforms linked by odometry, plus loop edges.
///
/// Node `i` holds the world-from-submap transform of submap `i`. Submap 0 is
/// the world frame.
pub struct PoseGraph {
    config: PoseGraphConfig,
    model: TransformModel,
    poses: Vec<Mat4>,
    /// `odometry[i]` maps node `i + 1` into node `i`.
    odometry: Vec<Mat4>,
    loop_edges: Vec<LoopEdge>,
}

impl PoseGraph {
    pub fn new(config: PoseGraphConfig, model: TransformModel) -> Self {
        Self {
            config,
            model,
            poses: Vec::new(),
            odometry: Vec::new(),
            loop_edges: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn loop_edge_count(&self) -> usize {
        self.loop_edges.len()
    }

    pub fn pose(&self, idx: usize) -> Option<Mat4> {
        self.poses.get(idx).copied()
    }

    pub fn poses(&self) -> &[Mat4] {
        &self.poses
    }

    /// Append a node. The first node is anchored at the identity and ignores
    /// `odometry`; later nodes chain onto their predecessor.
    pub fn add_node(&mut self, odometry: Mat4) -> usize {
        let idx = self.poses.len();
        match self.poses.last() {
            Some(prev) => {
                let pose = *prev * odometry;
                self.odometry.push(odometry);
                self.poses.push(pose);
            }
            None => self.poses.push(Mat4::IDENTITY),
        }
        idx
    }

    /// Add a loop edge; `from_idx` must precede `to_idx`.
    pub fn add_loop(&mut self, from_idx: usize, to_idx: usize, measurement: Mat4) -> bool {
        if from_idx >= to_idx || to_idx >= self.poses.len() {
            return false;
        }
        self.loop_edges.push(LoopEdge {
            from_idx,
            to_idx,
            measurement,
        });
        true
    }

    /// Re-derive every node from odometry, then relax loop residuals by
    /// spreading each correction along the chain between the two ends.
    pub fn optimize(&mut self) -> Result<OptimizationSummary, SolverError> {
        self.reset_from_odometry();
        if self.loop_edges.is_empty() {
            return Ok(OptimizationSummary::default());
        }

        let mut iterations = 0;
        for _ in 0..self.config.max_iterations {
            iterations += 1;
            let mut worst = 0.0f32;
            for e in 0..self.loop_edges.len() {
                let (from, to, measurement) = {
                    let edge = &self.loop_edges[e];
                    (edge.from_idx, edge.to_idx, edge.measurement)
                };
                let correction = self.correction(from, to, measurement);
                worst = worst.max(residual_norm(correction, self.model));

                let span = (to - from) as f32;
                for i in (from + 1)..self.poses.len() {
                    let w = self.config.relaxation * ((i - from) as f32 / span).min(1.0);
                    self.poses[i] = blend(correction, w, self.model) * self.poses[i];
                }
            }

            if self.poses.iter().any(|p| !p.is_finite()) {
                return Err(SolverError::Diverged);
            }
            if worst < self.config.convergence_threshold {
                break;
            }
        }

        let residual = self.max_loop_residual();
        debug!(iterations, residual, "Pose graph relaxed");
        if !residual.is_finite() {
            return Err(SolverError::Diverged);
        }
        if residual > self.config.max_residual {
            return Err(SolverError::NotConverged { residual });
        }
        Ok(OptimizationSummary {
            iterations,
            residual,
            loop_edges: self.loop_edges.len(),
        })
    }

    fn reset_from_odometry(&mut self) {
        for (i, odometry) in self.odometry.iter().enumerate() {
            self.poses[i + 1] = self.poses[i] * *odometry;
        }
    }

    /// World-space transform taking node `to` onto the pose its loop edge predicts.
    fn correction(&self, from: usize, to: usize, measurement: Mat4) -> Mat4 {
        (self.poses[from] * measurement) * self.poses[to].inverse()
    }

    fn max_loop_residual(&self) -> f32 {
        self.loop_edges
            .iter()
            .map(|e| residual_norm(self.correction(e.from_idx, e.to_idx, e.measurement), self.model))
            .fold(0.0, f32::max)
    }
}

fn normalize_projective(m: Mat4) -> Mat4 {
    let w = m.w_axis.w;
    if w.abs() > f32::EPSILON { m * (1.0 / w) } else { m }
}

/// Frobenius distance of a correction from the identity.
fn residual_norm(correction: Mat4, model: TransformModel) -> f32 {
    let c = match model {
        TransformModel::Similarity => correction,
        TransformModel::Projective => normalize_projective(correction),
    };
    (c - Mat4::IDENTITY)
        .to_cols_array()
        .iter()
        .map(|v| v * v)
        .sum::<f32>()
        .sqrt()
}

/// Fraction `w` of a correction: geodesic for similarities, linear otherwise.
fn blend(correction: Mat4, w: f32, model: TransformModel) -> Mat4 {
    match model {
        TransformModel::Similarity => {
            let (scale, rotation, translation) = correction.to_scale_rotation_translation();
            let scale = (scale.x + scale.y + scale.z) / 3.0;
            Mat4::from_scale_rotation_translation(
                Vec3::splat(scale.powf(w)),
                Quat::IDENTITY.slerp(rotation, w),
                translation * w,
            )
        }
        TransformModel::Projective => {
            normalize_projective(Mat4::IDENTITY * (1.0 - w) + normalize_projective(correction) * w)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(x: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, 0.0, 0.0))
    }

    fn chain(model: TransformModel) -> PoseGraph {
        let mut graph = PoseGraph::new(PoseGraphConfig::default(), model);
        for _ in 0..4 {
            graph.add_node(step(1.0));
        }
        graph
    }

    fn x_of(graph: &PoseGraph, idx: usize) -> f32 {
        graph.pose(idx).unwrap().w_axis.x
    }

    #[test]
    fn test_odometry_chain_without_loops() {
        let mut graph = chain(TransformModel::Similarity);
        let summary = graph.optimize().unwrap();
        assert_eq!(summary.loop_edges, 0);
        assert_eq!(graph.pose(0).unwrap(), Mat4::IDENTITY);
        assert!((x_of(&graph, 3) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_loop_spreads_correction_along_chain() {
        for model in [TransformModel::Similarity, TransformModel::Projective] {
            let mut graph = chain(model);
            assert!(graph.add_loop(0, 3, step(2.7)));
            let summary = graph.optimize().unwrap();

            assert!(summary.residual < 1e-3, "{model:?}: {}", summary.residual);
            assert!((x_of(&graph, 1) - 0.9).abs() < 1e-3);
            assert!((x_of(&graph, 2) - 1.8).abs() < 1e-3);
            assert!((x_of(&graph, 3) - 2.7).abs() < 1e-3);
        }
    }

    #[test]
    fn test_optimize_is_repeatable() {
        let mut graph = chain(TransformModel::Similarity);
        graph.add_loop(1, 3, step(1.9));
        graph.optimize().unwrap();
        let first = graph.poses().to_vec();
        graph.optimize().unwrap();
        assert_eq!(graph.poses(), first.as_slice());
    }

    #[test]
    fn test_conflicting_loops_do_not_converge() {
        let config = PoseGraphConfig {
            max_residual: 0.01,
            ..PoseGraphConfig::default()
        };
        let mut graph = PoseGraph::new(config, TransformModel::Similarity);
        for _ in 0..3 {
            graph.add_node(step(1.0));
        }
        graph.add_loop(0, 2, step(2.0));
        graph.add_loop(0, 2, step(-4.0));
        assert!(matches!(graph.optimize(), Err(SolverError::NotConverged { .. })));
    }

    #[test]
    fn test_invalid_loop_edges_are_refused() {
        let mut graph = chain(TransformModel::Similarity);
        assert!(!graph.add_loop(2, 2, Mat4::IDENTITY));
        assert!(!graph.add_loop(3, 1, Mat4::IDENTITY));
        assert!(!graph.add_loop(0, 9, Mat4::IDENTITY));
        assert_eq!(graph.loop_edge_count(), 0);
    }

    #[test]
    fn test_config_defaults_from_empty_toml_like_map() {
        let config: PoseGraphConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PoseGraphConfig::default());
    }
}
