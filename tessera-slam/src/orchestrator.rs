//! Single-pass reconstruction driver.

use crate::backend::{GeometryBackend, InferenceError, ModelHandle};
use crate::cancel::CancelToken;
use crate::config::SlamConfig;
use crate::error::SlamError;
use crate::export::SceneExporter;
use crate::keyframe::{DisparityEstimator, KeyframeGate};
use crate::solver::{MapSolver, SubmapInput};
use crate::submap::{SubmapGeometry, SubmapId, SubmapStore, SubmapWindow};
use std::path::PathBuf;
use std::sync::Arc;
use tessera_capture::CaptureSource;
use tessera_data::Frame;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Streaming,
    ProcessingSubmap,
    Finalizing,
    Done,
    Failed,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub artifact: PathBuf,
    pub submap_count: usize,
    pub loop_count: usize,
    pub raw_frames: usize,
    pub admitted_frames: usize,
    pub skipped_frames: usize,
}

impl RunReport {
    pub fn status_message(&self) -> String {
        format!(
            "Reconstruction completed with {} submaps and {} loop closures.",
            self.submap_count, self.loop_count
        )
    }
}

/// Drives one frame stream through the gate and the window, and sequences
/// inference, ingest, optimization and propagation for every finalized submap.
///
/// An orchestrator runs once. Submaps are processed strictly in stream order.
pub struct SlamOrchestrator<'m, D, B, S, E>
where
    D: DisparityEstimator,
{
    config: SlamConfig,
    gate: KeyframeGate<D>,
    window: SubmapWindow,
    model: &'m ModelHandle<B>,
    solver: S,
    exporter: E,
    store: SubmapStore,
    cancel: CancelToken,
    state: RunState,
    raw_frames: usize,
    skipped_frames: usize,
}

impl<'m, D, B, S, E> SlamOrchestrator<'m, D, B, S, E>
where
    D: DisparityEstimator,
    B: GeometryBackend,
    S: MapSolver,
    E: SceneExporter,
{
    pub fn new(
        config: SlamConfig,
        estimator: D,
        model: &'m ModelHandle<B>,
        solver: S,
        exporter: E,
    ) -> Result<Self, SlamError> {
        config.validate()?;
        let gate = if config.keyframe_gating {
            KeyframeGate::new(estimator, config.min_disparity)
        } else {
            KeyframeGate::disabled(estimator)
        };
        let window = SubmapWindow::new(config.submap_capacity());

        Ok(Self {
            config,
            gate,
            window,
            model,
            solver,
            exporter,
            store: SubmapStore::new(),
            cancel: CancelToken::new(),
            state: RunState::Streaming,
            raw_frames: 0,
            skipped_frames: 0,
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn store(&self) -> &SubmapStore {
        &self.store
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn exporter(&self) -> &E {
        &self.exporter
    }

    /// Consume `source` to the end and export the scene.
    pub fn run<C: CaptureSource + ?Sized>(&mut self, source: &mut C) -> Result<RunReport, SlamError> {
        if matches!(self.state, RunState::Done | RunState::Failed) {
            return Err(SlamError::InvalidState(self.state));
        }

        match self.drive(source) {
            Ok(report) => {
                self.state = RunState::Done;
                info!("{}", report.status_message());
                Ok(report)
            }
            Err(e) => {
                self.state = RunState::Failed;
                source.stop();
                Err(e)
            }
        }
    }

    fn drive<C: CaptureSource + ?Sized>(&mut self, source: &mut C) -> Result<RunReport, SlamError> {
        self.state = RunState::Streaming;
        info!(
            "Starting reconstruction: submap size {}, max loops {}, keyframe gating {}",
            self.config.submap_size,
            self.config.max_loops_per_submap,
            if self.gate.is_enabled() { "on" } else { "off" }
        );

        loop {
            self.check_cancel()?;
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) if e.is_frame_local() => {
                    warn!("Skipping frame: {}", e);
                    self.raw_frames += 1;
                    self.skipped_frames += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            self.raw_frames += 1;

            if !self.gate.admit(&frame) {
                continue;
            }
            if let Some(frames) = self.window.push(Arc::new(frame)) {
                self.process_submap(frames)?;
            }
        }

        // A lone carryover is already part of the last submap. Flushing only new
        // frames keeps the count at ceil((admitted - 1) / submap_size), unlike
        // resubmitting the carryover when the trailing raw frames were rejected.
        if self.window.has_pending()
            && let Some(frames) = self.window.flush()
        {
            self.process_submap(frames)?;
        }
        if self.store.is_empty() {
            return Err(SlamError::NoDecodableFrames);
        }

        self.finalize()
    }

    fn check_cancel(&self) -> Result<(), SlamError> {
        if self.cancel.is_cancelled() {
            info!("Cancellation requested after {} submaps", self.store.len());
            Err(SlamError::Cancelled(self.store.len()))
        } else {
            Ok(())
        }
    }

    fn process_submap(&mut self, frames: Vec<Arc<Frame>>) -> Result<(), SlamError> {
        self.state = RunState::ProcessingSubmap;
        let submap = self.store.next_id();
        let max_loops = self.config.max_loops_per_submap;
        info!(
            "Processing submap {} ({} frames, {}..={})",
            submap,
            frames.len(),
            frames.first().map(|f| f.index).unwrap_or_default(),
            frames.last().map(|f| f.index).unwrap_or_default()
        );

        self.check_cancel()?;
        let mut candidates = self.solver.loop_candidates(&self.store, &frames, max_loops);
        candidates.truncate(max_loops);

        let mut inputs = frames.clone();
        inputs.extend(candidates.iter().map(|c| Arc::clone(&c.frame)));
        let geometry = self.predict(submap, &inputs)?;

        self.check_cancel()?;
        let optimization_error = |source| SlamError::Optimization { submap, source };
        self.solver
            .ingest(
                &mut self.store,
                SubmapInput {
                    frames,
                    geometry,
                    candidates,
                },
            )
            .map_err(optimization_error)?;

        self.check_cancel()?;
        let summary = self.solver.optimize().map_err(optimization_error)?;
        self.solver.propagate_transforms(&mut self.store);
        debug!(
            submap,
            iterations = summary.iterations,
            residual = summary.residual,
            loop_edges = summary.loop_edges,
            "Submap optimized"
        );

        self.state = RunState::Streaming;
        Ok(())
    }

    fn predict(&self, submap: SubmapId, inputs: &[Arc<Frame>]) -> Result<SubmapGeometry, SlamError> {
        let inference_error = |source| SlamError::Inference { submap, source };
        let backend = self.model.get().map_err(inference_error)?;

        let geometry = match backend.predict(inputs) {
            Err(e) if e.is_transient() => {
                warn!("Inference for submap {} failed ({}), retrying once", submap, e);
                backend.predict(inputs)
            }
            result => result,
        }
        .map_err(inference_error)?;

        if geometry.len() != inputs.len() {
            return Err(inference_error(InferenceError::FrameCountMismatch {
                expected: inputs.len(),
                got: geometry.len(),
            }));
        }
        Ok(geometry)
    }

    fn finalize(&mut self) -> Result<RunReport, SlamError> {
        self.state = RunState::Finalizing;
        self.check_cancel()?;
        self.exporter.refresh(&self.store)?;

        let submap_count = self.solver.submap_count();
        let loop_count = self.solver.loop_count();
        info!("Map has {} submaps and {} loop closures", submap_count, loop_count);

        let artifact = self.exporter.export(loop_count)?;
        Ok(RunReport {
            artifact,
            submap_count,
            loop_count,
            raw_frames: self.raw_frames,
            admitted_frames: self.gate.admitted(),
            skipped_frames: self.skipped_frames,
        })
    }
}
