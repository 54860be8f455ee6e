//! Proximity grouping and violation detection.
//!
//! People far from the camera look small and people close to it look large, so
//! a single pixel distance cannot say who is standing too close. The engine
//! instead sorts person boxes by area, cuts the sorted run into groups of
//! similar size, and judges distances inside each group against the square of
//! that group's mean height.
//!
//! One call handles one frame. Nothing carries over between calls except the
//! palette, which is fixed when the engine is built.

use serde::Serialize;
use thiserror::Error;

use crate::detect::Detection;
use crate::palette::{Palette, Rgb};

/// Largest area ratio between sort-adjacent people that still share a group.
pub const DEFAULT_GROUP_RATIO: f64 = 1.4;

/// Height difference (pixels) at which two people are no longer comparable.
pub const DEFAULT_MAX_HEIGHT_DIFF: i32 = 35;

/// Input that breaks the detector's output contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("detection {index} has non-positive size {width}x{height}")]
    NonPositiveSize { index: usize, width: i32, height: i32 },
    #[error("detection {index} has zero area")]
    ZeroArea { index: usize },
    #[error("detection {index} at ({x}, {y}) size {width}x{height} leaves pixel range")]
    OutOfRange {
        index: usize,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
}

/// Pixel-space point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance, saturating at `i64::MAX`.
    pub fn distance_sq(self, other: Point) -> i64 {
        let dx = other.x as i64 - self.x as i64;
        let dy = other.y as i64 - self.y as i64;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

/// Size and position summary of one detected person.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonRecord {
    area: i64,
    center: Point,
    width: i32,
    height: i32,
    top_left: Point,
    source_index: usize,
}

impl PersonRecord {
    /// Build a record, rejecting boxes without positive extent.
    pub fn from_detection(index: usize, detection: &Detection) -> Result<Self, ContractViolation> {
        let (w, h) = (detection.w, detection.h);
        if w <= 0 || h <= 0 {
            return Err(ContractViolation::NonPositiveSize {
                index,
                width: w,
                height: h,
            });
        }
        let center = detection
            .x
            .checked_add(w / 2)
            .zip(detection.y.checked_add(h / 2))
            .ok_or(ContractViolation::OutOfRange {
                index,
                x: detection.x,
                y: detection.y,
                width: w,
                height: h,
            })?;
        Ok(Self {
            area: w as i64 * h as i64,
            center: Point::new(center.0, center.1),
            width: w,
            height: h,
            top_left: Point::new(detection.x, detection.y),
            source_index: index,
        })
    }

    pub fn area(&self) -> i64 {
        self.area
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    /// Position of the originating detection in the analyzed slice.
    pub fn source_index(&self) -> usize {
        self.source_index
    }
}

/// Size-homogeneous run of the area-sorted records.
#[derive(Clone, Debug)]
pub struct Group {
    index: usize,
    members: Vec<PersonRecord>,
    avg_height: f64,
}

impl Group {
    fn new(index: usize, members: Vec<PersonRecord>) -> Self {
        let total: i64 = members.iter().map(|m| m.height as i64).sum();
        let avg_height = total as f64 / members.len() as f64;
        Self {
            index,
            members,
            avg_height,
        }
    }

    /// Position of this group in the frame's partition.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn members(&self) -> &[PersonRecord] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn avg_height(&self) -> f64 {
        self.avg_height
    }

    /// Squared distance below which two members count as too close.
    pub fn threshold_sq(&self) -> f64 {
        self.avg_height * self.avg_height
    }
}

/// One violating ordered pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Violation {
    pub group: usize,
    pub first: Point,
    pub second: Point,
    pub first_index: usize,
    pub second_index: usize,
    pub color: Rgb,
    pub distance_sq: i64,
    pub height_diff: i32,
}

/// Everything the engine derived from one frame.
#[derive(Clone, Debug, Default)]
pub struct FrameAnalysis {
    pub groups: Vec<Group>,
    /// Ordered pairs; each violating pair appears once per visiting order.
    pub violations: Vec<Violation>,
}

impl FrameAnalysis {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn person_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    /// Violations with the mirrored duplicate of each pair removed.
    pub fn unique_pairs(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.first_index < v.second_index)
    }

    /// Serializable digest for logs and JSON output.
    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            people: self.person_count(),
            groups: self.groups.len(),
            violating_pairs: self.unique_pairs().count(),
            violations: self.unique_pairs().cloned().collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalysisSummary {
    pub people: usize,
    pub groups: usize,
    pub violating_pairs: usize,
    pub violations: Vec<Violation>,
}

/// Tunable constants of the grouping rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineParams {
    pub group_ratio: f64,
    pub max_height_diff: i32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            group_ratio: DEFAULT_GROUP_RATIO,
            max_height_diff: DEFAULT_MAX_HEIGHT_DIFF,
        }
    }
}

/// Map detections to records, in input order.
pub fn build_records(detections: &[Detection]) -> Result<Vec<PersonRecord>, ContractViolation> {
    detections
        .iter()
        .enumerate()
        .map(|(i, d)| PersonRecord::from_detection(i, d))
        .collect()
}

/// Sort records by area and cut them into contiguous groups.
///
/// Each record is compared with the record placed immediately before it, not
/// with the first member of its group, so a slowly growing run can stay in one
/// group even when its ends differ by more than `group_ratio`.
pub fn partition(
    mut records: Vec<PersonRecord>,
    group_ratio: f64,
) -> Result<Vec<Vec<PersonRecord>>, ContractViolation> {
    records.sort_by_key(PersonRecord::area);

    let mut groups: Vec<Vec<PersonRecord>> = Vec::new();
    let mut prev_area: Option<i64> = None;
    for record in records {
        let split = match prev_area {
            None => true,
            Some(0) => {
                return Err(ContractViolation::ZeroArea {
                    index: record.source_index,
                })
            }
            Some(prev) => record.area as f64 / prev as f64 > group_ratio,
        };
        prev_area = Some(record.area);
        match groups.last_mut() {
            Some(current) if !split => current.push(record),
            _ => groups.push(vec![record]),
        }
    }
    Ok(groups)
}

/// Stateless per-frame analyzer holding the session palette.
///
/// Shareable by reference across threads analyzing different frames.
#[derive(Clone, Debug)]
pub struct ProximityEngine {
    palette: Palette,
    params: EngineParams,
}

impl ProximityEngine {
    pub fn new(palette: Palette) -> Self {
        Self::with_params(palette, EngineParams::default())
    }

    pub fn with_params(palette: Palette, params: EngineParams) -> Self {
        Self { palette, params }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn params(&self) -> EngineParams {
        self.params
    }

    /// Group one frame's person detections and find violating pairs.
    pub fn analyze(&self, detections: &[Detection]) -> Result<FrameAnalysis, ContractViolation> {
        if detections.is_empty() {
            return Ok(FrameAnalysis::default());
        }

        let records = build_records(detections)?;
        let groups: Vec<Group> = partition(records, self.params.group_ratio)?
            .into_iter()
            .enumerate()
            .map(|(i, members)| Group::new(i, members))
            .collect();

        let mut violations = Vec::new();
        for group in &groups {
            self.scan_group(group, &mut violations);
        }

        Ok(FrameAnalysis { groups, violations })
    }

    fn scan_group(&self, group: &Group, out: &mut Vec<Violation>) {
        let threshold_sq = group.threshold_sq();
        let color = self.palette.color(group.index);
        let members = group.members();

        for (j, a) in members.iter().enumerate() {
            for (k, b) in members.iter().enumerate() {
                if j == k {
                    continue;
                }
                let distance_sq = a.center.distance_sq(b.center);
                let height_diff = (a.height - b.height).abs();
                if (distance_sq as f64) < threshold_sq && height_diff < self.params.max_height_diff {
                    out.push(Violation {
                        group: group.index,
                        first: a.center,
                        second: b.center,
                        first_index: a.source_index,
                        second_index: b.source_index,
                        color,
                        distance_sq,
                        height_diff,
                    });
                }
            }
        }
    }
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ProximityEngine>();
    assert_send_sync::<FrameAnalysis>();
};
