// vigil-detect/src/lib.rs
// ============================================================
// vigil-detect  –  Post-processing stage for Vigil
// Turns a backend's packed output into a short list of
// proctoring-relevant detections.
// ------------------------------------------------------------
// Pipeline: RawOutput → decode → suppress → filter_relevant
// ------------------------------------------------------------
// Public API
//   * decode(raw, classes, conf)   – threshold + argmax per row
//   * suppress(dets, nms)          – greedy NMS, centre boxes
//   * filter_relevant(dets)        – proctoring allow-list
//   * ThresholdStore               – clamped conf / NMS knobs
// ============================================================

//! Vigil – detection layer
//!
//! Every stage here is a pure function of its inputs.  Boxes use the
//! centre convention throughout: `(cx, cy, w, h)` in model-input pixels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod decode;
mod nms;
mod relevance;
mod thresholds;

pub use decode::decode;
pub use nms::{iou, suppress};
pub use relevance::{filter_relevant, is_relevant, RELEVANT_CLASSES};
pub use thresholds::{
    ThresholdStore, ThresholdUpdate, Thresholds, DEFAULT_CONFIDENCE, DEFAULT_NMS, MAX_THRESHOLD,
    MIN_THRESHOLD,
};

#[derive(Debug, Error, PartialEq)]
pub enum PostprocessError {
    #[error("Output declares no classes")]
    NoClasses,
    #[error("Output buffer has {actual} values, expected {expected} ({boxes} boxes × {stride})")]
    OutputLength {
        boxes: usize,
        stride: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Output has {output} classes but the label table only {table}")]
    ClassTable { output: usize, table: usize },
}

pub type Result<T> = std::result::Result<T, PostprocessError>;

/// Axis-aligned box: centre x/y, width, height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    pub fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self { cx, cy, w, h }
    }

    /// `[x1, y1, x2, y2]`
    pub fn corners(&self) -> [f32; 4] {
        let (hw, hh) = (self.w / 2.0, self.h / 2.0);
        [self.cx - hw, self.cy - hh, self.cx + hw, self.cy + hh]
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }
}

impl From<[f32; 4]> for BBox {
    fn from([cx, cy, w, h]: [f32; 4]) -> Self {
        Self { cx, cy, w, h }
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.cx, b.cy, b.w, b.h]
    }
}

/// A single detection: class, confidence and centre box in input pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BBox,
}
