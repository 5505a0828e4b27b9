// vigil-detect/src/decode.rs
use crate::{BBox, Detection, PostprocessError, Result};
use log::debug;
use vigil_model::{RawOutput, BOX_VALUES};

/// Turn every candidate row whose best class score beats `confidence_threshold`
/// into a [`Detection`].
///
/// Rows are visited in output order.  The best class is the first index holding
/// the maximum score, so equal scores resolve to the lower class id; NaN scores
/// never win.
pub fn decode(raw: &RawOutput, class_names: &[&str], confidence_threshold: f32) -> Result<Vec<Detection>> {
    validate(raw, class_names)?;

    let mut dets = Vec::new();
    for row in 0..raw.box_count {
        let Some((class_id, score)) = best_class(raw, row) else {
            continue;
        };
        if score <= confidence_threshold {
            continue;
        }
        let geom: [f32; 4] = std::array::from_fn(|i| raw.value(row, i).unwrap_or(0.0));
        dets.push(Detection {
            class_id,
            class_name: class_names[class_id].to_string(),
            confidence: score,
            bbox: BBox::from(geom),
        });
    }

    debug!(
        "decoded {} of {} candidates above {:.2}",
        dets.len(),
        raw.box_count,
        confidence_threshold
    );
    Ok(dets)
}

fn validate(raw: &RawOutput, class_names: &[&str]) -> Result<()> {
    if raw.class_count == 0 {
        return Err(PostprocessError::NoClasses);
    }
    if !raw.is_well_formed() {
        return Err(PostprocessError::OutputLength {
            boxes: raw.box_count,
            stride: raw.stride(),
            expected: raw.expected_len(),
            actual: raw.data.len(),
        });
    }
    if raw.class_count > class_names.len() {
        return Err(PostprocessError::ClassTable {
            output: raw.class_count,
            table: class_names.len(),
        });
    }
    Ok(())
}

/// `(index, score)` of the highest class score in `row`.
fn best_class(raw: &RawOutput, row: usize) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for class in 0..raw.class_count {
        let score = raw.value(row, BOX_VALUES + class)?;
        match best {
            Some((_, top)) if score <= top => {}
            _ if score.is_nan() => {}
            _ => best = Some((class, score)),
        }
    }
    best
}
