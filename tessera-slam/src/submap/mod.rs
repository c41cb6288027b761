//! Submaps
//!
//! - [`SubmapWindow`]: groups keyframes into overlapping, bounded submaps
//! - [`Submap`] / [`SubmapStore`]: finalized submaps with geometry and transforms

pub mod store;
pub mod types;
pub mod window;

pub use store::SubmapStore;
pub use types::{FrameGeometry, LoopClosure, Submap, SubmapGeometry, SubmapId};
pub use window::SubmapWindow;
