//! Frames, scripted estimators and collaborator doubles shared by unit tests.

use crate::backend::{GeometryBackend, InferenceError};
use crate::export::{ExportError, SceneExporter};
use crate::keyframe::DisparityEstimator;
use crate::solver::{LoopCandidate, MapSolver, OptimizationSummary, SolverError, SubmapInput};
use crate::submap::{FrameGeometry, SubmapGeometry, SubmapId, SubmapStore};
use glam::{Mat4, Vec3};
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tessera_capture::{CaptureError, CaptureSource};
use tessera_data::Frame;

fn hash_noise(x: i64, y: i64, seed: u32) -> u8 {
    let mut h = (x as u32)
        .wrapping_mul(374_761_393)
        .wrapping_add((y as u32).wrapping_mul(668_265_263))
        .wrapping_add(seed.wrapping_mul(2_246_822_519));
    h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
    (h ^ (h >> 16)) as u8
}

/// Textured frame whose content is moved `shift` pixels to the right.
pub fn shifted_noise_frame(index: usize, width: u32, height: u32, seed: u32, shift: i64) -> Frame {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let v = hash_noise(x as i64 - shift, y as i64, seed);
        Rgb([v, v, v])
    });
    Frame::new(index, format!("frame_{index:04}.png"), image)
}

pub fn noise_frame(index: usize, width: u32, height: u32, seed: u32) -> Frame {
    shifted_noise_frame(index, width, height, seed, 0)
}

pub fn tiny_frame(index: usize) -> Frame {
    Frame::new(index, format!("frame_{index:04}.png"), RgbImage::new(2, 2))
}

/// In-memory frame stream; listed positions fail to decode.
pub struct ScriptedSource {
    items: VecDeque<Result<Frame, CaptureError>>,
    active: bool,
}

impl ScriptedSource {
    pub fn frames(count: usize) -> Self {
        Self::with_corrupt(count, &[])
    }

    pub fn with_corrupt(count: usize, corrupt: &[usize]) -> Self {
        let items = (0..count)
            .map(|i| {
                if corrupt.contains(&i) {
                    Err(CaptureError::Decode {
                        path: PathBuf::from(format!("frame_{i:04}.png")),
                        source: image::ImageError::IoError(std::io::Error::other("truncated file")),
                    })
                } else {
                    Ok(tiny_frame(i))
                }
            })
            .collect();
        Self { items, active: true }
    }
}

impl CaptureSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.active {
            return Ok(None);
        }
        self.items.pop_front().transpose()
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.items.len())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn stop(&mut self) {
        self.active = false;
    }
}

/// Disparity read from a table of 1-D camera positions indexed by frame.
pub struct ScriptedDisparity {
    positions: Vec<f32>,
}

impl ScriptedDisparity {
    pub fn new(positions: Vec<f32>) -> Self {
        Self { positions }
    }

    pub fn stationary() -> Self {
        Self::new(Vec::new())
    }
}

impl DisparityEstimator for ScriptedDisparity {
    type Features = f32;

    fn prepare(&self, frame: &Frame) -> f32 {
        self.positions.get(frame.index).copied().unwrap_or(0.0)
    }

    fn disparity(&self, anchor: &f32, current: &f32) -> f32 {
        (current - anchor).abs()
    }
}

/// Ordered record of collaborator calls.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Backend returning one flat point per frame, echoing the frame index.
pub struct EchoBackend {
    pub log: CallLog,
    pub transient_failures: AtomicUsize,
    pub fail_on_call: Option<usize>,
    calls: AtomicUsize,
}

impl EchoBackend {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            transient_failures: AtomicUsize::new(0),
            fail_on_call: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl GeometryBackend for EchoBackend {
    fn predict(&self, frames: &[Arc<Frame>]) -> Result<SubmapGeometry, InferenceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let indices: Vec<String> = frames.iter().map(|f| f.index.to_string()).collect();
        self.log.push(format!("predict [{}]", indices.join(",")));

        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(InferenceError::Transient("device busy".into()));
        }
        if self.fail_on_call == Some(call) {
            return Err(InferenceError::Failed("kernel panic".into()));
        }

        Ok(SubmapGeometry::new(
            frames
                .iter()
                .map(|f| FrameGeometry {
                    frame: f.index,
                    camera_pose: Mat4::IDENTITY,
                    points: vec![Vec3::new(f.index as f32, 0.0, 1.0)],
                    colors: vec![[255, 255, 255]],
                    confidence: vec![1.0],
                })
                .collect(),
        ))
    }
}

/// Solver double that records the call sequence and keeps submaps in the store.
pub struct RecordingSolver {
    pub log: CallLog,
    /// Loop candidates offered per insertion: (query frame, how many).
    pub offered_loops: usize,
    pub fail_optimize_at: Option<usize>,
    submaps: usize,
    loops: usize,
}

impl RecordingSolver {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            offered_loops: 0,
            fail_optimize_at: None,
            submaps: 0,
            loops: 0,
        }
    }
}

impl MapSolver for RecordingSolver {
    fn loop_candidates(
        &self,
        store: &SubmapStore,
        frames: &[Arc<Frame>],
        max_loops: usize,
    ) -> Vec<LoopCandidate> {
        self.log.push(format!("candidates max={max_loops}"));
        let Some(first) = store.get(0) else {
            return Vec::new();
        };
        // Offer more than allowed so callers are tested on truncation.
        (0..self.offered_loops)
            .map(|i| LoopCandidate {
                query_frame: frames[0].index,
                submap: first.id,
                frame: Arc::clone(&first.frames[i % first.frames.len()]),
                similarity: 1.0 - i as f32 * 0.01,
            })
            .collect()
    }

    fn ingest(&mut self, store: &mut SubmapStore, input: SubmapInput) -> Result<SubmapId, SolverError> {
        let indices: Vec<String> = input.frames.iter().map(|f| f.index.to_string()).collect();
        self.log.push(format!(
            "ingest [{}] loops={}",
            indices.join(","),
            input.candidates.len()
        ));
        self.loops += input.candidates.len();
        self.submaps += 1;
        let (window, _) = input.geometry.split(input.frames.len());
        Ok(store.insert(input.frames, window, Mat4::IDENTITY))
    }

    fn optimize(&mut self) -> Result<OptimizationSummary, SolverError> {
        self.log.push("optimize");
        if self.fail_optimize_at == Some(self.submaps) {
            return Err(SolverError::NotConverged { residual: 9.0 });
        }
        Ok(OptimizationSummary::default())
    }

    fn propagate_transforms(&self, _store: &mut SubmapStore) {
        self.log.push("propagate");
    }

    fn submap_count(&self) -> usize {
        self.submaps
    }

    fn loop_count(&self) -> usize {
        self.loops
    }
}

/// Exporter double that records calls and returns a fixed artifact path.
pub struct RecordingExporter {
    pub log: CallLog,
    pub refreshed_submaps: usize,
}

impl RecordingExporter {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            refreshed_submaps: 0,
        }
    }
}

impl SceneExporter for RecordingExporter {
    fn refresh(&mut self, store: &SubmapStore) -> Result<(), ExportError> {
        self.refreshed_submaps = store.len();
        self.log.push(format!("refresh {}", store.len()));
        Ok(())
    }

    fn export(&mut self, loop_closures: usize) -> Result<PathBuf, ExportError> {
        self.log.push(format!("export loops={loop_closures}"));
        Ok(PathBuf::from("scene.ply"))
    }
}
