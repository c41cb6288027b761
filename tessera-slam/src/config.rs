//! Run configuration and range validation.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

pub const SUBMAP_SIZE_RANGE: RangeInclusive<usize> = 4..=32;
pub const MAX_LOOPS_RANGE: RangeInclusive<usize> = 0..=5;
pub const MIN_DISPARITY_RANGE: RangeInclusive<f32> = 0.0..=100.0;
pub const CONFIDENCE_PERCENTILE_RANGE: RangeInclusive<f32> = 0.0..=100.0;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} = {value} is outside the allowed range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },
}

fn check_range<T>(field: &'static str, value: T, range: &RangeInclusive<T>) -> Result<(), ConfigError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            min: range.start().to_string(),
            max: range.end().to_string(),
        })
    }
}

/// Parameters of one reconstruction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlamConfig {
    /// Align submaps with similarity transforms instead of full projective ones.
    pub use_similarity_transform: bool,
    /// Keyframes per submap, excluding the carryover frame.
    pub submap_size: usize,
    /// Upper bound on loop-closure edges added while inserting one submap.
    pub max_loops_per_submap: usize,
    /// Minimum disparity (source pixels) between a keyframe and its predecessor.
    pub min_disparity: f32,
    /// Points below this per-submap confidence percentile are left out of the scene.
    pub confidence_threshold_percentile: f32,
    /// When false every decoded frame is a keyframe.
    pub keyframe_gating: bool,
}

impl Default for SlamConfig {
    fn default() -> Self {
        Self {
            use_similarity_transform: false,
            submap_size: 16,
            max_loops_per_submap: 1,
            min_disparity: 50.0,
            confidence_threshold_percentile: 25.0,
            keyframe_gating: true,
        }
    }
}

impl SlamConfig {
    /// Frames held by a full submap: `submap_size` new frames plus the carryover.
    pub fn submap_capacity(&self) -> usize {
        self.submap_size + 1
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("submap_size", self.submap_size, &SUBMAP_SIZE_RANGE)?;
        check_range("max_loops_per_submap", self.max_loops_per_submap, &MAX_LOOPS_RANGE)?;
        check_range("min_disparity", self.min_disparity, &MIN_DISPARITY_RANGE)?;
        check_range(
            "confidence_threshold_percentile",
            self.confidence_threshold_percentile,
            &CONFIDENCE_PERCENTILE_RANGE,
        )?;
        Ok(())
    }
}
