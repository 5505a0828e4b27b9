//! Messages crossing the worker boundary.

use crate::PipelineError;
use serde::Serialize;
use tokio::sync::oneshot;
use vigil_detect::{Detection, ThresholdUpdate, Thresholds};
use vigil_frame::{Frame, FrameId};
use vigil_model::ModelDescriptor;

/// Requests from a [`PipelineHandle`](crate::PipelineHandle) to the worker.
#[derive(Debug)]
pub(crate) enum Command {
    Submit(Frame),
    UpdateThresholds(ThresholdUpdate),
    ModelInfo(oneshot::Sender<Option<ModelDescriptor>>),
    Stats(oneshot::Sender<PipelineStats>),
}

/// Everything the worker reports back.
///
/// Each submitted frame receives exactly one terminal event:
/// [`Event::DetectionResults`] or [`Event::Error`] carrying its id.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    ModelLoaded {
        descriptor: ModelDescriptor,
    },
    ModelError {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    DetectionResults {
        frame_id: FrameId,
        timestamp: u64,
        detections: Vec<Detection>,
        elapsed_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        frame_id: Option<FrameId>,
        timestamp: Option<u64>,
        kind: &'static str,
        message: String,
    },
    ThresholdsUpdated {
        confidence: f32,
        nms: f32,
    },
}

impl Event {
    pub(crate) fn frame_failed(frame: &Frame, err: &PipelineError) -> Self {
        Event::Error {
            frame_id: Some(frame.id()),
            timestamp: Some(frame.submitted_at_ms()),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub(crate) fn thresholds(t: Thresholds) -> Self {
        Event::ThresholdsUpdated {
            confidence: t.confidence,
            nms: t.nms,
        }
    }

    /// Frame this event settles, if any.
    pub fn frame_id(&self) -> Option<FrameId> {
        match self {
            Event::DetectionResults { frame_id, .. } => Some(*frame_id),
            Event::Error { frame_id, .. } => *frame_id,
            _ => None,
        }
    }

    /// True for the one event every submitted frame ends with.
    pub fn is_terminal(&self) -> bool {
        self.frame_id().is_some()
    }
}

/// Counters maintained by the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub dropped: u64,
    pub timed_out: u64,
    pub queued: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_detect::BBox;

    #[test]
    fn results_serialize_with_type_tag() {
        let event = Event::DetectionResults {
            frame_id: FrameId(9),
            timestamp: 1_700_000_000_000,
            detections: vec![Detection {
                class_id: 0,
                class_name: "person".into(),
                confidence: 0.75,
                bbox: BBox::new(1.0, 2.0, 3.0, 4.0),
            }],
            elapsed_ms: 12,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "detectionResults");
        assert_eq!(json["frameId"], 9);
        assert_eq!(json["timestamp"], 1_700_000_000_000u64);
        assert_eq!(json["detections"][0]["className"], "person");
        assert!(event.is_terminal());
    }

    #[test]
    fn error_without_frame_is_not_terminal() {
        let event = Event::Error {
            frame_id: None,
            timestamp: None,
            kind: "InferenceError",
            message: "boom".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert!(json["frameId"].is_null());
        assert!(!event.is_terminal());

        let ack = serde_json::to_value(Event::thresholds(Thresholds { confidence: 1.0, nms: 0.1 })).unwrap();
        assert_eq!(ack["type"], "thresholdsUpdated");
        assert_eq!(ack["confidence"], 1.0);
    }
}
