//! Fixed-capacity keyframe window with single-frame carryover.

use std::collections::VecDeque;
use std::sync::Arc;
use tessera_data::Frame;
use tracing::debug;

/// Groups admitted frames into overlapping submaps.
///
/// Every finalized set ends with the frame that starts the next one. Frames
/// are shared by reference, finalizing copies only `Arc`s.
#[derive(Debug)]
pub struct SubmapWindow {
    buffer: VecDeque<Arc<Frame>>,
    capacity: usize,
    finalized: usize,
}

impl SubmapWindow {
    /// `capacity` counts the carryover frame. Values below 2 are raised to 2
    /// so consecutive submaps can always overlap.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            finalized: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of submaps finalized so far.
    pub fn finalized(&self) -> usize {
        self.finalized
    }

    /// Append a keyframe. Returns the finalized frame set when the window fills.
    pub fn push(&mut self, frame: Arc<Frame>) -> Option<Vec<Arc<Frame>>> {
        self.buffer.push_back(frame);
        if self.buffer.len() >= self.capacity {
            self.take()
        } else {
            None
        }
    }

    /// Whether the window holds frames that no finalized submap contains yet.
    /// The carryover of a finalized submap does not count.
    pub fn has_pending(&self) -> bool {
        self.buffer.len() > usize::from(self.finalized > 0)
    }

    /// Force-finalize whatever the window holds, even a lone carryover frame.
    pub fn flush(&mut self) -> Option<Vec<Arc<Frame>>> {
        if self.buffer.is_empty() {
            None
        } else {
            self.take()
        }
    }

    fn take(&mut self) -> Option<Vec<Arc<Frame>>> {
        let frames: Vec<Arc<Frame>> = self.buffer.iter().cloned().collect();
        let keep_from = self.buffer.len() - 1;
        self.buffer.drain(..keep_from);
        self.finalized += 1;
        debug!(
            "Finalized submap {} with {} frames, carrying over frame {}",
            self.finalized - 1,
            frames.len(),
            self.buffer.front().map(|f| f.index).unwrap_or_default()
        );
        Some(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tiny_frame;

    fn indices(frames: &[Arc<Frame>]) -> Vec<usize> {
        frames.iter().map(|f| f.index).collect()
    }

    /// Push `count` frames and flush at the end, collecting every submap.
    fn windows(count: usize, capacity: usize) -> Vec<Vec<usize>> {
        let mut window = SubmapWindow::new(capacity);
        let mut out = Vec::new();
        for i in 0..count {
            if let Some(frames) = window.push(Arc::new(tiny_frame(i))) {
                out.push(indices(&frames));
            }
        }
        if window.has_pending()
            && let Some(frames) = window.flush()
        {
            out.push(indices(&frames));
        }
        out
    }

    #[test]
    fn test_exact_capacity_is_one_submap() {
        let submaps = windows(17, 17);
        assert_eq!(submaps.len(), 1);
        assert_eq!(submaps[0], (0..17).collect::<Vec<_>>());
    }

    #[test]
    fn test_two_submaps_share_one_frame() {
        let submaps = windows(33, 17);
        assert_eq!(submaps.len(), 2);
        assert_eq!(submaps[0], (0..17).collect::<Vec<_>>());
        assert_eq!(submaps[1], (16..33).collect::<Vec<_>>());
    }

    #[test]
    fn test_submap_count_formula() {
        for capacity in [5, 9, 17, 33] {
            for n in 2..120 {
                let submaps = windows(n, capacity);
                let expected = (n - 1).div_ceil(capacity - 1);
                assert_eq!(submaps.len(), expected, "n={n} capacity={capacity}");

                for pair in submaps.windows(2) {
                    assert_eq!(pair[0].last(), pair[1].first());
                    assert_eq!(pair[0].len(), capacity);
                }
                let last = submaps.last().unwrap();
                assert!(last.len() <= capacity);
            }
        }
    }

    #[test]
    fn test_partial_flush() {
        let submaps = windows(20, 17);
        assert_eq!(submaps.len(), 2);
        assert_eq!(submaps[1], vec![16, 17, 18, 19]);
    }

    #[test]
    fn test_single_frame_flush_is_kept() {
        let mut window = SubmapWindow::new(5);
        for i in 0..5 {
            window.push(Arc::new(tiny_frame(i)));
        }
        assert_eq!(window.len(), 1);

        let remainder = window.flush().unwrap();
        assert_eq!(indices(&remainder), vec![4]);
        // The carryover survives its own flush.
        assert_eq!(window.len(), 1);
        assert_eq!(window.finalized(), 2);
    }

    #[test]
    fn test_single_frame_stream() {
        assert_eq!(windows(1, 17), vec![vec![0]]);
    }

    #[test]
    fn test_carryover_alone_is_not_pending() {
        let mut window = SubmapWindow::new(3);
        assert!(!window.has_pending());
        window.push(Arc::new(tiny_frame(0)));
        assert!(window.has_pending());
        window.push(Arc::new(tiny_frame(1)));
        window.push(Arc::new(tiny_frame(2)));
        assert_eq!(window.len(), 1);
        assert!(!window.has_pending());
        window.push(Arc::new(tiny_frame(3)));
        assert!(window.has_pending());
    }

    #[test]
    fn test_empty_flush() {
        let mut window = SubmapWindow::new(17);
        assert!(window.flush().is_none());
        assert_eq!(window.finalized(), 0);
    }

    #[test]
    fn test_capacity_floor() {
        let mut window = SubmapWindow::new(0);
        assert_eq!(window.capacity(), 2);
        assert!(window.push(Arc::new(tiny_frame(0))).is_none());
        assert_eq!(indices(&window.push(Arc::new(tiny_frame(1))).unwrap()), vec![0, 1]);
    }
}
