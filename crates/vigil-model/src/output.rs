//! Raw detector output and its packing.

use crate::BOX_VALUES;
use serde::{Deserialize, Serialize};

/// How candidate rows are laid out in the flat output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// `[box_count, 4 + classes]` – one contiguous row per candidate.
    BoxMajor,
    /// `[1, 4 + classes, box_count]` – one contiguous row per attribute,
    /// as produced by YOLOv8/YOLO11 ONNX exports (`[1, 84, 8400]`).
    AttributeMajor,
}

impl OutputLayout {
    /// Declared tensor shape for `boxes` candidates over `classes` classes.
    pub fn shape(self, boxes: usize, classes: usize) -> Vec<usize> {
        match self {
            OutputLayout::BoxMajor => vec![boxes, BOX_VALUES + classes],
            OutputLayout::AttributeMajor => vec![1, BOX_VALUES + classes, boxes],
        }
    }
}

/// Flat `f32` buffer handed from a backend to the decoder.
///
/// The buffer is not checked on construction; the decoder validates it
/// against `box_count` and `class_count` before reading.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    pub data: Vec<f32>,
    pub box_count: usize,
    pub class_count: usize,
    pub layout: OutputLayout,
}

impl RawOutput {
    pub fn new(data: Vec<f32>, box_count: usize, class_count: usize, layout: OutputLayout) -> Self {
        Self {
            data,
            box_count,
            class_count,
            layout,
        }
    }

    /// No candidates at all.
    pub fn empty(class_count: usize) -> Self {
        Self::new(Vec::new(), 0, class_count, OutputLayout::BoxMajor)
    }

    /// Values per candidate (4 box values + class scores).
    pub fn stride(&self) -> usize {
        BOX_VALUES + self.class_count
    }

    /// Number of values a well-formed buffer holds.
    pub fn expected_len(&self) -> usize {
        self.box_count * self.stride()
    }

    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.expected_len()
    }

    /// Value `attr` (0..stride) of candidate `row`, `None` out of range.
    pub fn value(&self, row: usize, attr: usize) -> Option<f32> {
        if row >= self.box_count || attr >= self.stride() {
            return None;
        }
        let idx = match self.layout {
            OutputLayout::BoxMajor => row * self.stride() + attr,
            OutputLayout::AttributeMajor => attr * self.box_count + row,
        };
        self.data.get(idx).copied()
    }
}
