// vigil-detect/src/thresholds.rs
use log::info;
use serde::{Deserialize, Serialize};

pub const MIN_THRESHOLD: f32 = 0.1;
pub const MAX_THRESHOLD: f32 = 1.0;
pub const DEFAULT_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_NMS: f32 = 0.4;

/// Snapshot of the two post-processing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub confidence: f32,
    pub nms: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            nms: DEFAULT_NMS,
        }
    }
}

impl Thresholds {
    /// Clamp both values into range; NaN falls back to the default.
    pub fn clamped(self) -> Self {
        Self {
            confidence: clamp_or(self.confidence, DEFAULT_CONFIDENCE),
            nms: clamp_or(self.nms, DEFAULT_NMS),
        }
    }
}

/// Partial update: `None` leaves the field alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    pub confidence: Option<f32>,
    pub nms: Option<f32>,
}

impl ThresholdUpdate {
    pub fn confidence(value: f32) -> Self {
        Self {
            confidence: Some(value),
            nms: None,
        }
    }

    pub fn nms(value: f32) -> Self {
        Self {
            confidence: None,
            nms: Some(value),
        }
    }
}

/// Owner of the live thresholds.  Values are always within
/// [`MIN_THRESHOLD`, `MAX_THRESHOLD`].
#[derive(Debug, Clone, Default)]
pub struct ThresholdStore {
    current: Thresholds,
}

impl ThresholdStore {
    pub fn new(initial: Thresholds) -> Self {
        Self {
            current: initial.clamped(),
        }
    }

    pub fn get(&self) -> Thresholds {
        self.current
    }

    /// Apply `update` and return the resulting snapshot.
    ///
    /// Each provided value is clamped; NaN is ignored.
    pub fn update(&mut self, update: ThresholdUpdate) -> Thresholds {
        if let Some(c) = update.confidence {
            self.current.confidence = clamp_or(c, self.current.confidence);
        }
        if let Some(n) = update.nms {
            self.current.nms = clamp_or(n, self.current.nms);
        }
        info!(
            "thresholds now confidence={:.2} nms={:.2}",
            self.current.confidence, self.current.nms
        );
        self.current
    }
}

fn clamp_or(value: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
    }
}
