//! Tessera Application
//!
//! Command-line front end for incremental submap reconstruction.
//!
//! - `tessera run`: reconstruct a scene from a folder of images
//! - `tessera inspect`: summarize an exported point cloud

mod session;
mod settings;

use clap::{Args, Parser, Subcommand};
use glam::Vec3;
use session::{SessionPaths, run_session};
use settings::Overrides;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::path::{Path, PathBuf};
use tessera_data::load_vertices_from_ply;
use tessera_slam::{CancelToken, ModelHandle, ReliefBackend};
use tracing::{info, warn};

/// Tessera - incremental submap reconstruction from image folders
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconstruct a scene from a directory of images
    Run(RunArgs),
    /// Print vertex count and bounds of a PLY point cloud
    Inspect {
        /// Path to PLY file
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory of extracted input images
    #[arg(short, long)]
    input: PathBuf,

    /// Scratch directory (wiped before the run)
    #[arg(short, long)]
    workspace: PathBuf,

    /// Output directory for scene.ply and trajectory.json
    #[arg(short, long)]
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keyframes per submap (4-32)
    #[arg(long)]
    submap_size: Option<usize>,

    /// Maximum loop closures per submap (0-5)
    #[arg(long)]
    max_loops: Option<usize>,

    /// Minimum keyframe disparity in pixels (0-100)
    #[arg(long)]
    min_disparity: Option<f32>,

    /// Confidence percentile below which points are dropped (0-100)
    #[arg(long)]
    conf_threshold: Option<f32>,

    /// Align submaps with similarity transforms instead of projective ones
    #[arg(long)]
    sim3: bool,

    /// Treat every decoded frame as a keyframe
    #[arg(long)]
    no_keyframe_gate: bool,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            use_similarity_transform: self.sim3.then_some(true),
            submap_size: self.submap_size,
            max_loops_per_submap: self.max_loops,
            min_disparity: self.min_disparity,
            confidence_threshold_percentile: self.conf_threshold,
            keyframe_gating: self.no_keyframe_gate.then_some(false),
        }
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

/// Cancel the run on SIGINT/SIGTERM. The run stops at the next step boundary and exports nothing.
fn watch_signals(cancel: CancelToken) {
    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Failed to register signal handlers: {}", e);
            return;
        }
    };
    let spawned = std::thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("Received signal {}, stopping after the current step...", sig);
                cancel.cancel();
            }
        });
    if let Err(e) = spawned {
        warn!("Failed to spawn signal handler thread: {}", e);
    }
}

fn run(args: RunArgs) -> Result<(), String> {
    let config = settings::load(args.config.as_deref(), &args.overrides()).map_err(|e| e.to_string())?;
    info!("Configuration: {:?}", config);

    let cancel = CancelToken::new();
    watch_signals(cancel.clone());

    let model = ModelHandle::new("relief", || Ok(ReliefBackend::default()));
    let paths = SessionPaths {
        input: args.input,
        workspace: args.workspace,
        output: args.output,
    };

    let outcome = run_session(&paths, &config, &model, cancel);
    match outcome.artifact {
        Some(artifact) => {
            println!("{}", outcome.status);
            println!("Scene written to {}", artifact.display());
            Ok(())
        }
        None => Err(outcome.status),
    }
}

fn inspect(path: &Path) -> Result<(), String> {
    let points = load_vertices_from_ply(path).map_err(|e| e.to_string())?;
    println!("{}: {} vertices", path.display(), points.len());
    if let Some(first) = points.first() {
        let (min, max) = points.iter().fold((first.position, first.position), |(lo, hi), p| {
            (lo.min(p.position), hi.max(p.position))
        });
        let extent: Vec3 = max - min;
        println!("  min    {:?}", min.to_array());
        println!("  max    {:?}", max.to_array());
        println!("  extent {:?}", extent.to_array());
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Inspect { path } => inspect(&path),
    };
    if let Err(e) = result {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
