//! Greedy non-max suppression over pixel-space boxes.

use super::result::Detection;

/// Intersection over union of two boxes. Degenerate boxes yield 0.
pub fn iou(a: &Detection, b: &Detection) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.w).min(b.x + b.w);
    let y2 = (a.y + a.h).min(b.y + b.h);

    let intersection = if x2 > x1 && y2 > y1 {
        (x2 - x1) as f32 * (y2 - y1) as f32
    } else {
        0.0
    };

    let area_a = a.w.max(0) as f32 * a.h.max(0) as f32;
    let area_b = b.w.max(0) as f32 * b.h.max(0) as f32;
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Keep the most confident box of every overlapping cluster.
///
/// Boxes are visited in descending confidence; a box is dropped when its IoU
/// with an already kept box exceeds `iou_threshold`.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if keep.iter().all(|kept| iou(kept, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = Detection::person(10, 10, 20, 40, 0.9);
        assert!((iou(&a, &a) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = Detection::person(0, 0, 10, 10, 0.9);
        let b = Detection::person(20, 20, 10, 10, 0.9);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn suppresses_overlapping_lower_confidence_box() {
        let strong = Detection::person(100, 100, 50, 120, 0.9);
        let weak = Detection::person(102, 101, 50, 120, 0.5);
        let apart = Detection::person(400, 100, 50, 120, 0.6);

        let kept = non_max_suppression(vec![weak, apart.clone(), strong.clone()], 0.3);
        assert_eq!(kept, vec![strong, apart]);
    }

    #[test]
    fn keeps_boxes_below_threshold() {
        // Overlap of 25 px² over a union of 175 px² is about 0.14.
        let a = Detection::person(0, 0, 10, 10, 0.9);
        let b = Detection::person(5, 5, 10, 10, 0.8);
        assert_eq!(non_max_suppression(vec![a, b], 0.3).len(), 2);
    }
}
