//! Keyframe admission.

use crate::keyframe::DisparityEstimator;
use tessera_data::Frame;
use tracing::debug;

/// Admits frames that moved far enough from the last admitted frame.
///
/// The anchor is owned by the gate instance, so independent gates never
/// share state.
pub struct KeyframeGate<D: DisparityEstimator> {
    estimator: D,
    min_disparity: f32,
    enabled: bool,
    anchor: Option<D::Features>,
    admitted: usize,
    rejected: usize,
}

impl<D: DisparityEstimator> KeyframeGate<D> {
    pub fn new(estimator: D, min_disparity: f32) -> Self {
        Self {
            estimator,
            min_disparity,
            enabled: true,
            anchor: None,
            admitted: 0,
            rejected: 0,
        }
    }

    /// A gate that admits every frame and tracks no anchor.
    pub fn disabled(estimator: D) -> Self {
        Self {
            enabled: false,
            ..Self::new(estimator, 0.0)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_anchor(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn admitted(&self) -> usize {
        self.admitted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Decide whether `frame` becomes a keyframe. The anchor moves only on admission.
    pub fn admit(&mut self, frame: &Frame) -> bool {
        if !self.enabled {
            self.admitted += 1;
            return true;
        }

        let features = self.estimator.prepare(frame);
        let Some(anchor) = &self.anchor else {
            debug!("Frame {} admitted as first keyframe", frame.index);
            self.anchor = Some(features);
            self.admitted += 1;
            return true;
        };

        let disparity = self.estimator.disparity(anchor, &features);
        if disparity >= self.min_disparity {
            debug!(
                "Frame {} admitted (disparity {:.1} >= {:.1})",
                frame.index, disparity, self.min_disparity
            );
            self.anchor = Some(features);
            self.admitted += 1;
            true
        } else {
            debug!(
                "Frame {} rejected (disparity {:.1} < {:.1})",
                frame.index, disparity, self.min_disparity
            );
            self.rejected += 1;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedDisparity, tiny_frame};

    fn run(gate: &mut KeyframeGate<ScriptedDisparity>, count: usize) -> Vec<usize> {
        (0..count)
            .map(tiny_frame)
            .filter(|frame| gate.admit(frame))
            .map(|frame| frame.index)
            .collect()
    }

    #[test]
    fn test_first_frame_always_admitted() {
        let mut gate = KeyframeGate::new(ScriptedDisparity::stationary(), 100.0);
        assert_eq!(run(&mut gate, 5), vec![0]);
        assert_eq!(gate.rejected(), 4);
    }

    #[test]
    fn test_compares_against_last_admitted_frame() {
        // Camera creeps 20 px per frame; with a 50 px threshold only every
        // third frame clears the bar relative to the previous keyframe.
        let positions: Vec<f32> = (0..10).map(|i| i as f32 * 20.0).collect();
        let mut gate = KeyframeGate::new(ScriptedDisparity::new(positions), 50.0);
        assert_eq!(run(&mut gate, 10), vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut gate = KeyframeGate::new(ScriptedDisparity::new(vec![0.0, 50.0, 99.0]), 50.0);
        assert_eq!(run(&mut gate, 3), vec![0, 1]);
    }

    #[test]
    fn test_disabled_gate_admits_everything() {
        let mut gate = KeyframeGate::disabled(ScriptedDisparity::stationary());
        assert_eq!(run(&mut gate, 7).len(), 7);
        assert!(!gate.has_anchor());
        assert_eq!(gate.admitted(), 7);
    }

    #[test]
    fn test_consecutive_admissions_respect_threshold() {
        let positions = vec![0.0, 10.0, 70.0, 75.0, 80.0, 200.0, 201.0, 260.0];
        let min = 50.0;
        let mut gate = KeyframeGate::new(ScriptedDisparity::new(positions.clone()), min);
        let admitted = run(&mut gate, positions.len());

        for pair in admitted.windows(2) {
            assert!((positions[pair[1]] - positions[pair[0]]).abs() >= min);
        }
        assert_eq!(admitted, vec![0, 2, 5, 7]);
    }

    #[test]
    fn test_gates_do_not_share_anchor() {
        let mut a = KeyframeGate::new(ScriptedDisparity::stationary(), 1.0);
        let mut b = KeyframeGate::new(ScriptedDisparity::stationary(), 1.0);
        assert!(a.admit(&tiny_frame(0)));
        assert!(b.admit(&tiny_frame(1)));
        assert!(!a.admit(&tiny_frame(2)));
    }
}
