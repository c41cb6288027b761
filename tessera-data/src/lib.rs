//! Tessera Data Crate
//!
//! Frames, colored points and camera poses, plus the PLY and trajectory files
//! a reconstruction run produces. No mapping logic lives here.

pub mod error;
pub mod ply;
pub mod trajectory;
pub mod types;

pub use error::DataError;
pub use ply::{PlyVertex, load_vertices_from_ply, write_points_ply};
pub use trajectory::{CameraRecord, SubmapRecord, Trajectory};
pub use types::{CameraPose, Frame, ScenePoint};
