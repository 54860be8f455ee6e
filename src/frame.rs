//! Decoded video frames.
//!
//! A `Frame` owns its RGB24 pixels for exactly one pass through the session:
//! it is read from a source, optionally handed to the detector, returned to the
//! caller for rendering, and then dropped.

use anyhow::{anyhow, Result};

use crate::detect::{DetectionResult, DetectorBackend};

/// Owned RGB24 frame with its 1-based position in the stream.
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub index: u64,
}

impl Frame {
    /// Wrap decoded pixels, checking that the buffer matches the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame {} is {}x{} but carries {} bytes (expected {})",
                index,
                width,
                height,
                pixels.len(),
                expected
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            index,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Run a detector backend over this frame.
    pub fn run_detector<D: DetectorBackend + ?Sized>(&self, detector: &mut D) -> Result<DetectionResult> {
        detector.detect(&self.pixels, self.width, self.height)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, StubBackend};

    #[test]
    fn frame_checks_buffer_length() {
        assert!(Frame::new(vec![0u8; 12], 2, 2, 1).is_ok());
        assert!(Frame::new(vec![0u8; 11], 2, 2, 1).is_err());
    }

    #[test]
    fn frame_runs_detector() {
        let frame = Frame::new(vec![7u8; 27], 3, 3, 4).unwrap();
        let mut backend = StubBackend::scripted(vec![vec![Detection::person(0, 0, 1, 2, 0.9)]]);
        let result = frame.run_detector(&mut backend).unwrap();
        assert_eq!(result.detections.len(), 1);
        assert_eq!(frame.index, 4);
        assert_eq!(frame.pixels().len(), 27);
    }
}
