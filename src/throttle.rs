//! Frame sampling policy.
//!
//! Detection is the expensive stage, so only a subset of frames is analyzed.
//! The decision depends on the 1-based frame index alone; the caller owns the
//! counter.

use anyhow::{anyhow, Result};

/// Analyze one frame out of this many (plus the very first frame).
pub const DEFAULT_INTERVAL: u64 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameThrottle {
    interval: u64,
}

impl FrameThrottle {
    pub fn new(interval: u64) -> Result<Self> {
        if interval == 0 {
            return Err(anyhow!("throttle interval must be at least 1"));
        }
        Ok(Self { interval })
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Frame 1 is always analyzed; later frames only on multiples of the interval.
    pub fn should_analyze(&self, frame_index: u64) -> bool {
        frame_index == 1 || (frame_index > 1 && frame_index % self.interval == 0)
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_matches_one_in_four() {
        let throttle = FrameThrottle::default();
        let analyzed: Vec<u64> = (1..=13).filter(|&i| throttle.should_analyze(i)).collect();
        assert_eq!(analyzed, vec![1, 4, 8, 12]);
    }

    #[test]
    fn index_zero_is_never_analyzed() {
        assert!(!FrameThrottle::default().should_analyze(0));
        assert!(!FrameThrottle::new(1).unwrap().should_analyze(0));
    }

    #[test]
    fn interval_one_analyzes_everything() {
        let throttle = FrameThrottle::new(1).unwrap();
        assert!((1..=20).all(|i| throttle.should_analyze(i)));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(FrameThrottle::new(0).is_err());
    }
}
