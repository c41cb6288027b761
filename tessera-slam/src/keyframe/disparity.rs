//! Frame-to-frame motion measures used for keyframe admission.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::corners::{Corner, corners_fast9};
use tessera_data::Frame;

/// Pyramid levels stop before either side drops below this.
const MIN_LEVEL_SIDE: u32 = 24;

/// Scalar motion between an anchor frame and a newer frame.
///
/// `prepare` runs once per frame; the gate keeps the prepared features of its
/// anchor so they are never recomputed.
pub trait DisparityEstimator {
    type Features;

    fn prepare(&self, frame: &Frame) -> Self::Features;

    /// Motion from `anchor` to `current`, in source-resolution pixels.
    fn disparity(&self, anchor: &Self::Features, current: &Self::Features) -> f32;
}

/// Tuning for [`FlowDisparity`].
#[derive(Debug, Clone, Copy)]
pub struct FlowConfig {
    /// Frames wider than this are downscaled before tracking.
    pub working_width: u32,
    /// FAST-9 intensity threshold.
    pub fast_threshold: u8,
    /// Strongest corners kept on the anchor.
    pub max_corners: usize,
    /// Half-size of the SAD matching patch.
    pub patch_radius: u32,
    /// Halvings of the working image searched coarse-to-fine.
    pub pyramid_levels: usize,
    /// Half-size of the search window on the coarsest level.
    pub coarse_search_radius: u32,
    /// Half-size of the refinement window on every finer level.
    pub search_radius: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        // At 320 working pixels the coarse level reaches about 148 px, well past
        // the largest allowed minimum disparity.
        Self {
            working_width: 320,
            fast_threshold: 20,
            max_corners: 150,
            patch_radius: 3,
            pyramid_levels: 3,
            coarse_search_radius: 16,
            search_radius: 4,
        }
    }
}

/// Grayscale pyramid of a frame with its trackable corners.
#[derive(Debug, Clone)]
pub struct FlowFeatures {
    /// Level 0 is the working image; each further level is half as large.
    pyramid: Vec<GrayImage>,
    corners: Vec<Corner>,
    /// Source pixels per working pixel.
    scale: f32,
    source_dims: (u32, u32),
}

impl FlowFeatures {
    pub fn corner_count(&self) -> usize {
        self.corners.len()
    }

    pub fn level_count(&self) -> usize {
        self.pyramid.len()
    }
}

/// Sparse optical flow by coarse-to-fine block matching.
///
/// Corners of the anchor are searched for in the current frame, first over a
/// wide window on the coarsest pyramid level and then refined on each finer
/// level. The median track length is the disparity. A track whose coarse match
/// lands on the search border moved further than the pyramid can measure and
/// counts as infinite.
#[derive(Debug, Clone, Default)]
pub struct FlowDisparity {
    config: FlowConfig,
}

impl FlowDisparity {
    pub fn new(config: FlowConfig) -> Self {
        Self { config }
    }

    fn pyramid(&self, base: GrayImage) -> Vec<GrayImage> {
        let mut levels = vec![base];
        while levels.len() <= self.config.pyramid_levels {
            let Some(last) = levels.last() else { break };
            let (w, h) = (last.width() / 2, last.height() / 2);
            if w < MIN_LEVEL_SIDE || h < MIN_LEVEL_SIDE {
                break;
            }
            let next = imageops::resize(last, w, h, FilterType::Triangle);
            levels.push(next);
        }
        levels
    }

    /// Best displacement of the patch at `at` within `radius` of `guess`.
    /// Returns `None` when no candidate fits inside both images.
    fn search(
        &self,
        anchor: &GrayImage,
        current: &GrayImage,
        at: (i64, i64),
        guess: (i64, i64),
        radius: i64,
    ) -> Option<(i64, i64)> {
        let p = self.config.patch_radius as i64;
        let (cx, cy) = at;
        let inside = |x: i64, y: i64, img: &GrayImage| {
            x - p >= 0 && y - p >= 0 && x + p < img.width() as i64 && y + p < img.height() as i64
        };
        if !inside(cx, cy, anchor) {
            return None;
        }

        let mut best: Option<(u32, i64, i64)> = None;
        for dy in guess.1 - radius..=guess.1 + radius {
            for dx in guess.0 - radius..=guess.0 + radius {
                let (tx, ty) = (cx + dx, cy + dy);
                if !inside(tx, ty, current) {
                    continue;
                }
                let bound = best.map_or(u32::MAX, |b| b.0);
                let mut sad = 0u32;
                for oy in -p..=p {
                    for ox in -p..=p {
                        let a = anchor.get_pixel((cx + ox) as u32, (cy + oy) as u32)[0];
                        let b = current.get_pixel((tx + ox) as u32, (ty + oy) as u32)[0];
                        sad += a.abs_diff(b) as u32;
                    }
                    if sad > bound {
                        break;
                    }
                }
                let better = match best {
                    None => true,
                    Some((s, bx, by)) => {
                        sad < s || (sad == s && dx * dx + dy * dy < bx * bx + by * by)
                    }
                };
                if better {
                    best = Some((sad, dx, dy));
                }
            }
        }
        best.map(|(_, dx, dy)| (dx, dy))
    }

    fn track(&self, anchor: &FlowFeatures, current: &FlowFeatures, corner: &Corner) -> f32 {
        let coarsest = anchor.pyramid.len().min(current.pyramid.len()) - 1;
        let mut guess = (0i64, 0i64);

        for level in (0..=coarsest).rev() {
            let radius = i64::from(if level == coarsest {
                self.config.coarse_search_radius
            } else {
                self.config.search_radius
            });
            let at = ((corner.x >> level) as i64, (corner.y >> level) as i64);
            let found = self.search(&anchor.pyramid[level], &current.pyramid[level], at, guess, radius);

            match found {
                Some((dx, dy)) => {
                    if level == coarsest && (dx.abs() == radius || dy.abs() == radius) {
                        return f32::INFINITY;
                    }
                    guess = (dx, dy);
                }
                // Carried out of view on the working image.
                None if level == 0 => return f32::INFINITY,
                None => {}
            }
            if level > 0 {
                guess = (guess.0 * 2, guess.1 * 2);
            }
        }
        ((guess.0 * guess.0 + guess.1 * guess.1) as f32).sqrt()
    }
}

impl DisparityEstimator for FlowDisparity {
    type Features = FlowFeatures;

    fn prepare(&self, frame: &Frame) -> FlowFeatures {
        let gray = imageops::grayscale(&frame.image);
        let source_dims = gray.dimensions();
        let (gray, scale) = if source_dims.0 > self.config.working_width {
            let scale = source_dims.0 as f32 / self.config.working_width as f32;
            let height = ((source_dims.1 as f32 / scale).round() as u32).max(1);
            (
                imageops::resize(&gray, self.config.working_width, height, FilterType::Triangle),
                scale,
            )
        } else {
            (gray, 1.0)
        };

        let p = self.config.patch_radius;
        let (w, h) = gray.dimensions();
        let mut corners: Vec<Corner> = corners_fast9(&gray, self.config.fast_threshold)
            .into_iter()
            .filter(|c| c.x >= p && c.y >= p && c.x + p < w && c.y + p < h)
            .collect();
        corners.sort_by(|a, b| b.score.total_cmp(&a.score));
        corners.truncate(self.config.max_corners);

        FlowFeatures {
            pyramid: self.pyramid(gray),
            corners,
            scale,
            source_dims,
        }
    }

    fn disparity(&self, anchor: &FlowFeatures, current: &FlowFeatures) -> f32 {
        if anchor.source_dims != current.source_dims || anchor.corners.is_empty() {
            return f32::INFINITY;
        }

        let mut lengths: Vec<f32> = anchor
            .corners
            .iter()
            .map(|corner| self.track(anchor, current, corner))
            .collect();
        lengths.sort_by(f32::total_cmp);
        let median = lengths[lengths.len() / 2];
        median * anchor.scale
    }
}
