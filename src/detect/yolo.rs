//! Decoding of Darknet-style YOLO output rows.
//!
//! Each row is `[cx, cy, w, h, objectness, class_0, class_1, ...]` with the box
//! normalized to 0..1. Class 0 is `person` in the COCO label set.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Result};

use super::result::{Detection, ObjectClass};

const BOX_FIELDS: usize = 5;
const PERSON_CLASS: usize = 0;

/// Decode rows into pixel-space person detections.
///
/// A row is kept when its best class is `person` and that class score is
/// strictly above `confidence_threshold`. Rows too short to carry a class score
/// are skipped.
pub fn decode_person_rows<'a, I>(
    rows: I,
    frame_width: u32,
    frame_height: u32,
    confidence_threshold: f32,
) -> Vec<Detection>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let fw = frame_width as f32;
    let fh = frame_height as f32;

    rows.into_iter()
        .filter(|row| row.len() > BOX_FIELDS)
        .filter_map(|row| {
            let scores = &row[BOX_FIELDS..];
            let (class_id, confidence) = argmax(scores)?;
            if class_id != PERSON_CLASS || confidence <= confidence_threshold {
                return None;
            }

            let center_x = (row[0] * fw) as i32;
            let center_y = (row[1] * fh) as i32;
            let box_w = (row[2] * fw) as i32;
            let box_h = (row[3] * fh) as i32;

            Some(Detection {
                x: (center_x as f32 - box_w as f32 / 2.0) as i32,
                y: (center_y as f32 - box_h as f32 / 2.0) as i32,
                w: box_w,
                h: box_h,
                confidence,
                class: ObjectClass::Person,
            })
        })
        // Collapsed boxes would violate the engine's size contract.
        .filter(|d| d.w > 0 && d.h > 0)
        .collect()
}

fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((i, score)),
        })
}

/// Detector models known to the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    YoloV3,
    YoloV3Tiny,
    YoloV4,
    YoloV4Tiny,
    EnetCoco,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::YoloV3,
        ModelKind::YoloV3Tiny,
        ModelKind::YoloV4,
        ModelKind::YoloV4Tiny,
        ModelKind::EnetCoco,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::YoloV3 => "yolov3",
            ModelKind::YoloV3Tiny => "yolov3-tiny",
            ModelKind::YoloV4 => "yolov4",
            ModelKind::YoloV4Tiny => "yolov4-tiny",
            ModelKind::EnetCoco => "enet-coco",
        }
    }

    /// Model file location inside a models directory.
    pub fn model_path(self, models_dir: &Path) -> PathBuf {
        models_dir.join(format!("{}.onnx", self.name()))
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = ModelKind::ALL.iter().map(|k| k.name()).collect();
                anyhow!("unknown model '{}' (available: {})", s, known.join(", "))
            })
    }
}
