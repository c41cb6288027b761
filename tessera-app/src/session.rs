//! One reconstruction run: staging, discovery and the orchestrated pass.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use tessera_capture::{CaptureError, ImageSequence, ScratchWorkspace, discover_images};
use tessera_slam::{
    CancelToken, FlowDisparity, ModelHandle, PlyExporter, PoseGraphSolver, ReliefBackend,
    RunReport, SlamConfig, SlamError, SlamOrchestrator, TransformModel,
};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct SessionPaths {
    /// Extracted image directory.
    pub input: PathBuf,
    /// Scratch directory, wiped at the start of the run.
    pub workspace: PathBuf,
    /// Where the scene and trajectory are written.
    pub output: PathBuf,
}

/// What the caller shows the user: an artifact on success, and a status line.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub artifact: Option<PathBuf>,
    pub status: String,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.artifact.is_some()
    }
}

/// Error message followed by its source chain.
fn describe(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn ensure_disjoint(paths: &SessionPaths) -> Result<(), SlamError> {
    fs::create_dir_all(&paths.workspace).map_err(CaptureError::from)?;
    let input = paths.input.canonicalize().map_err(CaptureError::from)?;
    let workspace = paths.workspace.canonicalize().map_err(CaptureError::from)?;
    if input.starts_with(&workspace) || workspace.starts_with(&input) {
        return Err(CaptureError::WorkspaceOverlap { workspace, input }.into());
    }
    Ok(())
}

pub fn reconstruct(
    paths: &SessionPaths,
    config: &SlamConfig,
    model: &ModelHandle<ReliefBackend>,
    cancel: CancelToken,
) -> Result<RunReport, SlamError> {
    ensure_disjoint(paths)?;
    let workspace = ScratchWorkspace::acquire(&paths.workspace)?;
    let staged = workspace.stage_directory(&paths.input)?;
    info!("Staged {} files from {}", staged, paths.input.display());

    let images = discover_images(workspace.root())?;
    if images.is_empty() {
        return Err(SlamError::NoValidImages(paths.input.clone()));
    }
    info!("Found {} images", images.len());

    let solver = PoseGraphSolver::with_model(TransformModel::from_similarity_flag(
        config.use_similarity_transform,
    ));
    let exporter = PlyExporter::new(&paths.output, config.confidence_threshold_percentile);
    let mut orchestrator =
        SlamOrchestrator::new(config.clone(), FlowDisparity::default(), model, solver, exporter)?
            .with_cancel_token(cancel);

    let mut frames = ImageSequence::new(images);
    orchestrator.run(&mut frames)
}

pub fn run_session(
    paths: &SessionPaths,
    config: &SlamConfig,
    model: &ModelHandle<ReliefBackend>,
    cancel: CancelToken,
) -> RunOutcome {
    match reconstruct(paths, config, model, cancel) {
        Ok(report) => RunOutcome {
            status: report.status_message(),
            artifact: Some(report.artifact),
        },
        Err(e) => {
            let status = describe(&e);
            error!(kind = ?e.kind(), "Reconstruction failed: {}", status);
            RunOutcome {
                artifact: None,
                status,
            }
        }
    }
}
