//! Stand-in backend used when no model file is available.
//!
//! The stub never looks at pixel values.  Per frame it either reports nothing
//! or a single confident candidate, packed exactly like a real `BoxMajor`
//! output so that the decoder, NMS and relevance filter run unchanged.

use crate::{
    check_input, InferenceBackend, ModelConfig, ModelDescriptor, OutputLayout, RawOutput, Result,
    BOX_VALUES, COCO_CLASSES,
};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use vigil_preprocess::Tensor;

/// Chance that a frame produces no candidate at all.
pub const EMPTY_PROBABILITY: f64 = 0.3;
/// Range the synthetic confidence is drawn from.
pub const MIN_CONFIDENCE: f32 = 0.5;
pub const MAX_CONFIDENCE: f32 = 0.9;
/// Class ids the stub picks from: person, laptop, cell phone, book.
pub const STUB_CLASSES: [usize; 4] = [0, 63, 67, 73];

pub struct StubBackend {
    descriptor: ModelDescriptor,
    latency: Duration,
    rng: StdRng,
}

impl StubBackend {
    pub fn new(input_size: u32, latency: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let descriptor = ModelDescriptor {
            name: "stub".to_string(),
            version: "0".to_string(),
            input_size,
            output_shape: OutputLayout::BoxMajor.shape(1, COCO_CLASSES.len()),
            layout: OutputLayout::BoxMajor,
            class_names: &COCO_CLASSES,
            is_stub: true,
        };
        Self {
            descriptor,
            latency,
            rng,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.input_size, config.stub_latency(), config.stub_seed)
    }

    /// Deterministic stub without latency, handy for tests.
    pub fn with_seed(input_size: u32, seed: u64) -> Self {
        Self::new(input_size, Duration::ZERO, Some(seed))
    }

    /// One candidate row: a box fully inside the input square plus a one-hot score.
    fn synthetic_row(&mut self) -> Vec<f32> {
        let size = self.descriptor.input_size as f32;
        let classes = self.descriptor.class_count();

        let w = self.rng.gen_range(size * 0.1..=size * 0.5);
        let h = self.rng.gen_range(size * 0.1..=size * 0.5);
        let cx = self.rng.gen_range(w / 2.0..=size - w / 2.0);
        let cy = self.rng.gen_range(h / 2.0..=size - h / 2.0);
        let class = *STUB_CLASSES.choose(&mut self.rng).unwrap_or(&0);
        let score = self.rng.gen_range(MIN_CONFIDENCE..=MAX_CONFIDENCE);

        let mut row = vec![0f32; BOX_VALUES + classes];
        row[..BOX_VALUES].copy_from_slice(&[cx, cy, w, h]);
        row[BOX_VALUES + class] = score;
        debug!(
            "stub candidate {} ({score:.2}) at ({cx:.0},{cy:.0}) {w:.0}x{h:.0}",
            COCO_CLASSES[class]
        );
        row
    }
}

impl InferenceBackend for StubBackend {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn infer(&mut self, input: &Tensor) -> Result<RawOutput> {
        check_input(&self.descriptor, input)?;
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let classes = self.descriptor.class_count();
        if self.rng.gen_bool(EMPTY_PROBABILITY) {
            return Ok(RawOutput::empty(classes));
        }
        let row = self.synthetic_row();
        Ok(RawOutput::new(row, 1, classes, OutputLayout::BoxMajor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(size: usize) -> Tensor {
        Tensor::from_planar(size, vec![0.0; 3 * size * size]).unwrap()
    }

    #[test]
    fn outputs_are_empty_or_single_valid_row() {
        let mut stub = StubBackend::with_seed(64, 7);
        let input = blank(64);
        let (mut empty, mut single) = (0, 0);
        for _ in 0..500 {
            let out = stub.infer(&input).unwrap();
            assert!(out.is_well_formed());
            match out.box_count {
                0 => empty += 1,
                1 => {
                    single += 1;
                    let (cx, cy, w, h) = (out.data[0], out.data[1], out.data[2], out.data[3]);
                    assert!(w > 0.0 && h > 0.0);
                    assert!(cx - w / 2.0 >= 0.0 && cx + w / 2.0 <= 64.0);
                    assert!(cy - h / 2.0 >= 0.0 && cy + h / 2.0 <= 64.0);

                    let scores = &out.data[BOX_VALUES..];
                    let hot: Vec<usize> = (0..scores.len()).filter(|&i| scores[i] > 0.0).collect();
                    assert_eq!(hot.len(), 1);
                    assert!(STUB_CLASSES.contains(&hot[0]));
                    assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&scores[hot[0]]));
                }
                n => panic!("stub produced {n} rows"),
            }
        }
        // ~30% empty; generous bounds for a fixed seed
        assert!(empty > 90 && empty < 210, "empty = {empty}");
        assert_eq!(empty + single, 500);
    }

    #[test]
    fn same_seed_same_sequence() {
        let input = blank(32);
        let mut a = StubBackend::with_seed(32, 99);
        let mut b = StubBackend::with_seed(32, 99);
        for _ in 0..20 {
            assert_eq!(a.infer(&input).unwrap(), b.infer(&input).unwrap());
        }
    }

    #[test]
    fn wrong_tensor_size_is_rejected() {
        let mut stub = StubBackend::with_seed(32, 1);
        assert!(stub.infer(&blank(16)).is_err());
    }

    #[test]
    fn descriptor_marks_stub() {
        let stub = StubBackend::with_seed(640, 1);
        assert!(stub.descriptor().is_stub);
        assert_eq!(stub.descriptor().output_shape, vec![1, 84]);
    }
}
