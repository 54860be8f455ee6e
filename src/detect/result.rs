use serde::Serialize;

/// Result of running detection on a frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Boxes in frame pixel space, already non-max-suppressed.
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// Person-class detections only. This is what the grouping engine consumes.
    pub fn people(&self) -> Vec<Detection> {
        self.detections
            .iter()
            .filter(|d| d.class == ObjectClass::Person)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Axis-aligned box with top-left origin, in frame pixels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub confidence: f32,
    pub class: ObjectClass,
}

impl Detection {
    pub fn person(x: i32, y: i32, w: i32, h: i32, confidence: f32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            confidence,
            class: ObjectClass::Person,
        }
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ObjectClass {
    Person,
    Other,
}
