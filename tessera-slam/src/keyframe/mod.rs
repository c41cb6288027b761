//! Keyframe selection
//!
//! A [`KeyframeGate`] decides online which decoded frames carry enough new
//! motion to enter the map, using a pluggable [`DisparityEstimator`].

pub mod disparity;
pub mod gate;

pub use disparity::{DisparityEstimator, FlowConfig, FlowDisparity, FlowFeatures};
pub use gate::KeyframeGate;
