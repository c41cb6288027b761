//! Reconstruct a scene from a folder of images without staging.
//!
//! Usage:
//!   cargo run -p tessera-slam --example reconstruct_folder -- <images_dir> <output_dir>

use std::error::Error;
use std::path::PathBuf;
use tessera_capture::{ImageSequence, discover_images};
use tessera_slam::{
    FlowDisparity, ModelHandle, PlyExporter, PoseGraphSolver, ReliefBackend, SlamConfig,
    SlamOrchestrator, TransformModel,
};
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1).map(PathBuf::from);
    let (Some(images_dir), Some(output_dir)) = (args.next(), args.next()) else {
        return Err("usage: reconstruct_folder <images_dir> <output_dir>".into());
    };

    let images = discover_images(&images_dir)?;
    info!("Found {} images in {:?}", images.len(), images_dir);

    let config = SlamConfig::default();
    let model = ModelHandle::new("relief", || Ok(ReliefBackend::default()));
    let solver = PoseGraphSolver::with_model(TransformModel::from_similarity_flag(
        config.use_similarity_transform,
    ));
    let exporter = PlyExporter::new(output_dir, config.confidence_threshold_percentile);

    let mut orchestrator =
        SlamOrchestrator::new(config, FlowDisparity::default(), &model, solver, exporter)?;
    let report = orchestrator.run(&mut ImageSequence::new(images))?;

    info!(
        "{} frames read, {} keyframes, {} skipped",
        report.raw_frames, report.admitted_frames, report.skipped_frames
    );
    println!("{}", report.status_message());
    println!("Scene written to {}", report.artifact.display());
    Ok(())
}
