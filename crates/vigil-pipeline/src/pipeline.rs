//! The single frame → detections path.
//!
//! [`DetectionPipeline`] is what the worker runs for every frame, and what an
//! embedding application can call directly when it does not want a worker.

use crate::Result;
use log::debug;
use std::time::Instant;
use vigil_detect::{decode, filter_relevant, suppress, Detection, Thresholds};
use vigil_frame::Frame;
use vigil_model::{load_backend, InferenceBackend, ModelConfig, ModelDescriptor};
use vigil_preprocess::Preprocessor;

pub struct DetectionPipeline {
    preprocessor: Preprocessor,
    backend: Box<dyn InferenceBackend>,
}

impl DetectionPipeline {
    /// Build around an already initialised backend; the preprocessor is sized
    /// from the backend's descriptor.
    pub fn new(backend: Box<dyn InferenceBackend>) -> Self {
        let preprocessor = Preprocessor::new(backend.descriptor().input_size);
        Self { preprocessor, backend }
    }

    /// Load whichever backend `config` selects.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Ok(Self::new(load_backend(config)?))
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        self.backend.descriptor()
    }

    /// Preprocess → infer → decode → suppress → filter for one frame.
    pub fn run(&mut self, frame: &Frame, thresholds: Thresholds) -> Result<Vec<Detection>> {
        let t0 = Instant::now();
        let tensor = self.preprocessor.run(frame)?;
        let t1 = Instant::now();
        let raw = self.backend.infer(&tensor)?;
        drop(tensor);
        let t2 = Instant::now();

        let classes = self.backend.descriptor().class_names;
        let candidates = decode(&raw, classes, thresholds.confidence)?;
        let kept = suppress(candidates, thresholds.nms);
        let relevant = filter_relevant(kept);

        debug!(
            "frame {}: preprocess {:.2?}, infer {:.2?}, post {:.2?}, {} detections",
            frame.id(),
            t1 - t0,
            t2 - t1,
            t2.elapsed(),
            relevant.len()
        );
        Ok(relevant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineError;
    use vigil_model::{InferenceError, OutputLayout, RawOutput, StubBackend, BOX_VALUES, COCO_CLASSES};
    use vigil_preprocess::Tensor;

    /// Replays a fixed raw output for every frame.
    struct Replay {
        descriptor: ModelDescriptor,
        output: RawOutput,
    }

    impl Replay {
        fn rows(size: u32, rows: &[([f32; 4], usize, f32)]) -> Self {
            let stride = BOX_VALUES + COCO_CLASSES.len();
            let mut data = vec![0f32; rows.len() * stride];
            for (i, (geom, class, score)) in rows.iter().enumerate() {
                data[i * stride..i * stride + 4].copy_from_slice(geom);
                data[i * stride + BOX_VALUES + class] = *score;
            }
            let config = ModelConfig {
                input_size: size,
                box_count: rows.len(),
                layout: OutputLayout::BoxMajor,
                ..Default::default()
            };
            Self {
                descriptor: ModelDescriptor::for_model(&config),
                output: RawOutput::new(data, rows.len(), COCO_CLASSES.len(), OutputLayout::BoxMajor),
            }
        }
    }

    impl InferenceBackend for Replay {
        fn descriptor(&self) -> &ModelDescriptor {
            &self.descriptor
        }

        fn infer(&mut self, _input: &Tensor) -> vigil_model::Result<RawOutput> {
            Ok(self.output.clone())
        }
    }

    struct Broken(ModelDescriptor);

    impl InferenceBackend for Broken {
        fn descriptor(&self) -> &ModelDescriptor {
            &self.0
        }

        fn infer(&mut self, _input: &Tensor) -> vigil_model::Result<RawOutput> {
            Err(InferenceError::Runtime("device lost".into()))
        }
    }

    fn grey(id: u64, w: u32, h: u32) -> Frame {
        Frame::new(id, w, h, vec![128u8; (w * h * 4) as usize])
    }

    #[test]
    fn phone_is_reported() {
        let backend = Replay::rows(32, &[([16.0, 16.0, 8.0, 12.0], 67, 0.9)]);
        let mut pipeline = DetectionPipeline::new(Box::new(backend));
        let dets = pipeline.run(&grey(1, 64, 48), Thresholds::default()).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_name, "cell phone");
        assert_eq!(dets[0].confidence, 0.9);
    }

    #[test]
    fn weak_rows_give_empty_list() {
        let backend = Replay::rows(32, &[([16.0, 16.0, 8.0, 12.0], 67, 0.3), ([4.0, 4.0, 2.0, 2.0], 0, 0.5)]);
        let mut pipeline = DetectionPipeline::new(Box::new(backend));
        let dets = pipeline.run(&grey(1, 32, 32), Thresholds::default()).unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn thresholds_are_applied_per_call() {
        let backend = Replay::rows(
            32,
            &[
                ([10.0, 10.0, 10.0, 10.0], 0, 0.9),
                ([10.0, 12.5, 10.0, 10.0], 0, 0.8), // IoU 0.6 with the first
            ],
        );
        let mut pipeline = DetectionPipeline::new(Box::new(backend));
        let frame = grey(1, 32, 32);

        let strict = pipeline.run(&frame, Thresholds { confidence: 0.5, nms: 0.4 }).unwrap();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].confidence, 0.9);

        let loose = pipeline.run(&frame, Thresholds { confidence: 0.5, nms: 0.7 }).unwrap();
        assert_eq!(loose.len(), 2);

        let picky = pipeline.run(&frame, Thresholds { confidence: 0.85, nms: 0.7 }).unwrap();
        assert_eq!(picky.len(), 1);
    }

    #[test]
    fn irrelevant_classes_are_filtered() {
        let backend = Replay::rows(32, &[([16.0, 16.0, 8.0, 12.0], 23, 0.95)]);
        let mut pipeline = DetectionPipeline::new(Box::new(backend));
        assert!(pipeline.run(&grey(1, 32, 32), Thresholds::default()).unwrap().is_empty());
    }

    #[test]
    fn stage_errors_are_typed() {
        let mut pipeline = DetectionPipeline::new(Box::new(Replay::rows(32, &[])));
        let short = Frame::new(1, 32, 32, vec![0u8; 100]);
        let err = pipeline.run(&short, Thresholds::default()).unwrap_err();
        assert_eq!(err.kind(), "PreprocessingError");

        let descriptor = StubBackend::with_seed(32, 0).descriptor().clone();
        let mut broken = DetectionPipeline::new(Box::new(Broken(descriptor)));
        let err = broken.run(&grey(2, 32, 32), Thresholds::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Inference(InferenceError::Runtime(_))));
    }

    #[test]
    fn malformed_output_is_a_postprocessing_error() {
        let mut backend = Replay::rows(32, &[([1.0, 1.0, 1.0, 1.0], 0, 0.9)]);
        backend.output.data.truncate(10);
        let mut pipeline = DetectionPipeline::new(Box::new(backend));
        let err = pipeline.run(&grey(1, 32, 32), Thresholds::default()).unwrap_err();
        assert_eq!(err.kind(), "PostprocessingError");
    }

    #[test]
    fn from_config_picks_the_backend() {
        let config = ModelConfig {
            input_size: 32,
            stub_latency_ms: 0,
            stub_seed: Some(5),
            ..Default::default()
        };
        let mut pipeline = DetectionPipeline::from_config(&config).unwrap();
        assert!(pipeline.descriptor().is_stub);
        assert_eq!(pipeline.descriptor().input_size, 32);
        assert!(pipeline.run(&grey(1, 40, 30), Thresholds::default()).is_ok());

        let missing = ModelConfig {
            model_path: Some("/nonexistent/yolo.onnx".into()),
            ..config
        };
        let err = DetectionPipeline::from_config(&missing).err().expect("load must fail");
        assert_eq!(err.kind(), "InferenceError");
        assert!(matches!(err, PipelineError::Inference(InferenceError::Load { .. })));
    }

    #[test]
    fn stub_detections_obey_invariants() {
        let mut pipeline = DetectionPipeline::new(Box::new(StubBackend::with_seed(64, 3)));
        assert!(pipeline.descriptor().is_stub);
        let frame = grey(1, 80, 60);
        let mut seen = 0;
        for _ in 0..100 {
            let dets = pipeline.run(&frame, Thresholds { confidence: 0.1, nms: 0.4 }).unwrap();
            assert!(dets.len() <= 1);
            for d in dets {
                seen += 1;
                assert!((0.5..=0.9).contains(&d.confidence));
                assert!(d.bbox.w > 0.0 && d.bbox.h > 0.0);
                assert!(vigil_detect::is_relevant(&d.class_name));
            }
        }
        assert!(seen > 0);
    }
}
