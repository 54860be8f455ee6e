use anyhow::Result;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::{Detection, DetectionResult};

/// Scripted backend for tests and synthetic runs.
///
/// Each call to `detect` returns the next scripted detection list, cycling back
/// to the start once the script is exhausted. An empty script always returns no
/// detections.
pub struct StubBackend {
    script: Vec<Vec<Detection>>,
    calls: usize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Vec<Detection>>) -> Self {
        Self { script, calls: 0 }
    }

    /// A small crowd that exercises several groups and at least one violation.
    pub fn demo() -> Self {
        Self::scripted(vec![
            vec![
                Detection::person(100, 100, 40, 100, 0.92),
                Detection::person(150, 102, 42, 98, 0.88),
                Detection::person(400, 80, 60, 150, 0.81),
                Detection::person(600, 300, 20, 50, 0.77),
            ],
            vec![
                Detection::person(110, 100, 40, 100, 0.9),
                Detection::person(300, 100, 41, 101, 0.86),
            ],
            Vec::new(),
        ])
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(capability, DetectionCapability::PersonDetection)
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<DetectionResult> {
        let detections = if self.script.is_empty() {
            Vec::new()
        } else {
            self.script[self.calls % self.script.len()].clone()
        };
        self.calls += 1;
        Ok(DetectionResult::new(detections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_cycles_script() {
        let mut backend = StubBackend::scripted(vec![
            vec![Detection::person(0, 0, 10, 20, 0.9)],
            Vec::new(),
        ]);

        let r1 = backend.detect(b"frame1", 10, 10).unwrap();
        assert_eq!(r1.detections.len(), 1);

        let r2 = backend.detect(b"frame2", 10, 10).unwrap();
        assert!(r2.is_empty());

        let r3 = backend.detect(b"frame3", 10, 10).unwrap();
        assert_eq!(r3.detections.len(), 1);
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn empty_stub_returns_nothing() {
        let mut backend = StubBackend::new();
        assert!(backend.detect(b"", 0, 0).unwrap().is_empty());
        assert!(backend.supports(DetectionCapability::PersonDetection));
        assert!(!backend.supports(DetectionCapability::Classification));
    }
}
