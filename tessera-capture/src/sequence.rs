//! Frame stream over an ordered list of image files.

use crate::source::{CaptureError, CaptureSource};
use std::path::PathBuf;
use tessera_data::Frame;
use tracing::{debug, info};

/// Decodes image files lazily, in the given order.
///
/// Each frame's `index` is its position in the path list, so frames keep
/// their raw stream position even when earlier files fail to decode.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    cursor: usize,
    active: bool,
}

impl ImageSequence {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            cursor: 0,
            active: true,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl CaptureSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.active || self.cursor >= self.paths.len() {
            return Ok(None);
        }

        let index = self.cursor;
        self.cursor += 1;
        let path = &self.paths[index];

        let image = image::open(path)
            .map_err(|source| CaptureError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();

        debug!(
            "Decoded frame {} ({}x{}) from {}",
            index,
            image.width(),
            image.height(),
            path.display()
        );
        Ok(Some(Frame::new(index, path.clone(), image)))
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.paths.len().saturating_sub(self.cursor))
    }

    fn is_active(&self) -> bool {
        self.active && self.cursor < self.paths.len()
    }

    fn stop(&mut self) {
        self.active = false;
        info!("Image sequence stopped after {} frames", self.cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;

    fn write_png(path: &std::path::Path, value: u8) {
        RgbImage::from_pixel(8, 6, Rgb([value, value, value]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_sequence_decodes_in_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..3).map(|i| dir.path().join(format!("{i}.png"))).collect();
        for (i, path) in paths.iter().enumerate() {
            write_png(path, i as u8 * 10);
        }

        let mut sequence = ImageSequence::new(paths);
        assert_eq!(sequence.remaining(), Some(3));

        let mut seen = Vec::new();
        while let Some(frame) = sequence.next_frame().unwrap() {
            assert_eq!(frame.dimensions(), (8, 6));
            seen.push((frame.index, frame.image.get_pixel(0, 0)[0]));
        }

        assert_eq!(seen, vec![(0, 0), (1, 10), (2, 20)]);
        assert!(!sequence.is_active());
    }

    #[test]
    fn test_sequence_skips_past_corrupt_frame() {
        let dir = tempfile::TempDir::new().unwrap();
        let good_a = dir.path().join("0.png");
        let bad = dir.path().join("1.png");
        let good_b = dir.path().join("2.png");
        write_png(&good_a, 1);
        fs::write(&bad, b"definitely not a png").unwrap();
        write_png(&good_b, 2);

        let mut sequence = ImageSequence::new(vec![good_a, bad, good_b]);

        assert_eq!(sequence.next_frame().unwrap().unwrap().index, 0);
        let err = sequence.next_frame().unwrap_err();
        assert!(err.is_frame_local());
        assert_eq!(sequence.next_frame().unwrap().unwrap().index, 2);
        assert!(sequence.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_stop_ends_stream() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("0.png");
        write_png(&path, 5);

        let mut sequence = ImageSequence::new(vec![path]);
        sequence.stop();
        assert!(sequence.next_frame().unwrap().is_none());
    }
}
