// vigil-detect/src/nms.rs
// ------------------------------------------------------------
// helpers: IoU • greedy NMS
// ------------------------------------------------------------
use crate::{BBox, Detection};
use log::debug;

/// Intersection over union of two centre-format boxes.
///
/// Zero when the boxes do not overlap or when the union is degenerate.
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    let [ax1, ay1, ax2, ay2] = a.corners();
    let [bx1, by1, bx2, by2] = b.corners();

    let iw = ax2.min(bx2) - ax1.max(bx1);
    let ih = ay2.min(by2) - ay1.max(by1);
    if iw <= 0.0 || ih <= 0.0 {
        return 0.0;
    }
    let inter = iw * ih;
    // areas from the same corners as the intersection so iou(a, a) == 1 exactly
    let area_a = (ax2 - ax1) * (ay2 - ay1);
    let area_b = (bx2 - bx1) * (by2 - by1);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Greedy non-maximum suppression.
///
/// Detections are ranked by confidence (stable, so equal scores keep decode
/// order); each one is kept unless it overlaps an already kept box with
/// IoU ≥ `nms_threshold`.  Quadratic in the candidate count, which is small
/// after confidence filtering.
pub fn suppress(mut dets: Vec<Detection>, nms_threshold: f32) -> Vec<Detection> {
    let before = dets.len();
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(dets.len());
    'outer: for d in dets {
        for k in &keep {
            if iou(&d.bbox, &k.bbox) >= nms_threshold {
                continue 'outer;
            }
        }
        keep.push(d);
    }

    debug!("nms kept {} of {} at {:.2}", keep.len(), before, nms_threshold);
    keep
}
