//! Tessera SLAM Crate
//!
//! Incremental submap reconstruction from an ordered image stream. Frames
//! pass a disparity-based keyframe gate, are grouped into overlapping
//! submaps, and every finished submap is predicted, registered and optimized
//! before the next one starts.
//!
//! ## Modules
//!
//! - [`keyframe`]: keyframe gate and disparity estimation
//! - [`submap`]: submap window, submap data and storage
//! - [`backend`]: geometry prediction trait, shared model handle
//! - [`solver`]: map solver trait and the pose-graph reference solver
//! - [`export`]: scene exporter trait and the PLY exporter
//! - [`orchestrator`]: the single-pass driver tying everything together

pub mod backend;
pub mod cancel;
pub mod config;
pub mod error;
pub mod export;
pub mod keyframe;
pub mod orchestrator;
pub mod solver;
pub mod submap;

#[cfg(test)]
mod test_support;

pub use backend::{GeometryBackend, InferenceError, ModelHandle, ReliefBackend, ReliefConfig};
pub use cancel::CancelToken;
pub use config::{ConfigError, SlamConfig};
pub use error::{ErrorKind, SlamError};
pub use export::{ExportError, PlyExporter, SceneExporter};
pub use keyframe::{DisparityEstimator, FlowConfig, FlowDisparity, KeyframeGate};
pub use orchestrator::{RunReport, RunState, SlamOrchestrator};
pub use solver::{
    LoopCandidate, MapSolver, OptimizationSummary, PoseGraphSolver, PoseGraphSolverConfig,
    SolverError, SubmapInput, TransformModel,
};
pub use submap::{FrameGeometry, Submap, SubmapGeometry, SubmapStore, SubmapWindow};
