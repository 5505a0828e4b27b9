//! ONNX Runtime backend.
//!
//! Wraps a single `ort` session over a YOLO-style detector export.  The
//! session output is copied out verbatim; interpreting it is the decoder's job.

use crate::{check_input, InferenceBackend, InferenceError, ModelConfig, ModelDescriptor, RawOutput, Result};
use log::{debug, info};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor as OrtTensor;
use std::path::Path;
use std::time::Instant;
use vigil_preprocess::Tensor;

/// ONNX Runtime powered detector session.
pub struct OrtBackend {
    session: Session,
    input_name: String,
    descriptor: ModelDescriptor,
}

impl OrtBackend {
    /// Load and optimize the ONNX model, preparing it for inference.
    pub fn load(model_path: &Path, config: &ModelConfig) -> Result<Self> {
        let load_err = |message: String| InferenceError::Load {
            path: model_path.to_path_buf(),
            message,
        };
        if !model_path.is_file() {
            return Err(load_err("no such file".to_string()));
        }

        info!("loading ONNX model {}", model_path.display());
        let started = Instant::now();
        let session = Session::builder()
            .map_err(|e| load_err(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| load_err(e.to_string()))?;
        info!("model ready in {:.2?}", started.elapsed());

        Ok(Self {
            session,
            input_name: config.input_name.clone(),
            descriptor: ModelDescriptor::for_model(config),
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn infer(&mut self, input: &Tensor) -> Result<RawOutput> {
        check_input(&self.descriptor, input)?;

        // [1, 3, S, S] owned array → ort tensor
        let array = input
            .clone()
            .into_array()
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        let value = OrtTensor::from_array(array).map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let started = Instant::now();
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => value])
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        debug!("session run took {:.2?}", started.elapsed());

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        if data.len() != self.descriptor.output_len() {
            return Err(InferenceError::OutputShape {
                expected: self.descriptor.output_shape.clone(),
                actual: shape.iter().copied().collect(),
            });
        }

        Ok(RawOutput::new(
            data.to_vec(),
            data.len() / (crate::BOX_VALUES + self.descriptor.class_count()),
            self.descriptor.class_count(),
            self.descriptor.layout,
        ))
    }
}
