use anyhow::Result;

use crate::detect::result::DetectionResult;

/// Detection capabilities supported by backends.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    /// Person bounding boxes in frame pixel space.
    PersonDetection,
    Classification,
}

/// Detector backend trait.
///
/// Implementations own everything between raw pixels and the person boxes the
/// grouping engine consumes: model pre-processing, class filtering and
/// non-max suppression. The engine trusts the result and does not re-check
/// confidences.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection on an RGB24 frame.
    ///
    /// The pixel slice is only valid for the duration of the call.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
