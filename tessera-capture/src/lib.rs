//! Tessera Capture - ordered frame streams from image directories
//!
//! This crate turns an extracted image directory into the ordered frame
//! stream a reconstruction run consumes:
//!
//! - [`discover_images`]: filter and numerically sort candidate image files
//! - [`ImageSequence`]: a [`CaptureSource`] that decodes them one by one
//! - [`ScratchWorkspace`]: exclusive, wiped-per-run staging directory
//!
//! ## Example
//!
//! ```ignore
//! use tessera_capture::{discover_images, CaptureSource, ImageSequence};
//!
//! let mut frames = ImageSequence::new(discover_images(dir)?);
//! while let Some(frame) = frames.next_frame()? {
//!     // Process frame...
//! }
//! ```

mod discovery;
mod sequence;
mod source;
mod workspace;

pub use discovery::{discover_images, is_candidate_image, numeric_key};
pub use sequence::ImageSequence;
pub use source::{CaptureError, CaptureSource};
pub use workspace::ScratchWorkspace;

// Re-export the frame type for convenience
pub use tessera_data::Frame;
