//! # vigil-model
//!
//! Inference backends for the Vigil detection pipeline.
//!
//! A backend turns a preprocessed [`Tensor`] into a [`RawOutput`]: the packed
//! per-candidate box geometry and class scores the decoder reads.  Two
//! backends exist:
//!
//! - [`StubBackend`] – no model on disk; emits at most one synthetic
//!   candidate per frame with a simulated latency.  Seedable for tests.
//! - [`OrtBackend`] – an ONNX Runtime session over a YOLO-style export.
//!
//! Which one runs is decided once by [`load_backend`] from a [`ModelConfig`].

use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use vigil_preprocess::Tensor;

pub mod classes;
pub mod onnx;
pub mod output;
pub mod stub;

pub use classes::{class_id, COCO_CLASSES, COCO_CLASS_COUNT};
pub use onnx::OrtBackend;
pub use output::{OutputLayout, RawOutput};
pub use stub::StubBackend;

/// Values preceding the class scores in every candidate row (cx, cy, w, h).
pub const BOX_VALUES: usize = 4;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Invalid model configuration: {0}")]
    Config(String),
    #[error("Failed to load model {path:?}: {message}")]
    Load { path: PathBuf, message: String },
    #[error("Inference run failed: {0}")]
    Runtime(String),
    #[error("Input tensor is {actual}x{actual}, model expects {expected}x{expected}")]
    InputSize { expected: usize, actual: usize },
    #[error("Model output has shape {actual:?}, expected {expected:?}")]
    OutputShape { expected: Vec<usize>, actual: Vec<i64> },
    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, InferenceError>;

/// Configuration for backend selection and model geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX file to load; `None` selects the stub backend
    pub model_path: Option<PathBuf>,
    /// Human readable model name reported in the descriptor
    pub name: String,
    /// Model version reported in the descriptor
    pub version: String,
    /// Square input edge length in pixels
    pub input_size: u32,
    /// Name of the image input in the ONNX graph
    pub input_name: String,
    /// Candidate rows the model emits per frame
    pub box_count: usize,
    /// How the output tensor is packed
    pub layout: OutputLayout,
    /// Simulated per-frame latency of the stub backend
    pub stub_latency_ms: u64,
    /// Fixed RNG seed for the stub backend (random when unset)
    pub stub_seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            name: "yolov8n".to_string(),
            version: "8.0".to_string(),
            input_size: 640,
            input_name: "images".to_string(),
            box_count: 8400,
            layout: OutputLayout::AttributeMajor,
            stub_latency_ms: 50,
            stub_seed: None,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(InferenceError::Config("input_size must be positive".into()));
        }
        if self.model_path.is_some() && self.box_count == 0 {
            return Err(InferenceError::Config("box_count must be positive".into()));
        }
        Ok(())
    }

    pub fn stub_latency(&self) -> Duration {
        Duration::from_millis(self.stub_latency_ms)
    }
}

/// Immutable description of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub name: String,
    pub version: String,
    pub input_size: u32,
    pub output_shape: Vec<usize>,
    pub layout: OutputLayout,
    pub class_names: &'static [&'static str],
    pub is_stub: bool,
}

impl ModelDescriptor {
    /// Descriptor for a model-backed session built from `config`.
    pub fn for_model(config: &ModelConfig) -> Self {
        let classes = COCO_CLASSES.len();
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            input_size: config.input_size,
            output_shape: config.layout.shape(config.box_count, classes),
            layout: config.layout,
            class_names: &COCO_CLASSES,
            is_stub: false,
        }
    }

    pub fn class_count(&self) -> usize {
        self.class_names.len()
    }

    /// Number of `f32` values one inference produces.
    pub fn output_len(&self) -> usize {
        self.output_shape.iter().product()
    }
}

/// A tensor → raw output inference engine.
///
/// Implementations are driven from a single thread at a time; `&mut self`
/// lets them keep session state without interior locking.
pub trait InferenceBackend: Send {
    fn descriptor(&self) -> &ModelDescriptor;
    fn infer(&mut self, input: &Tensor) -> Result<RawOutput>;
}

/// Pick and initialise the backend `config` asks for.
///
/// A configured model path loads an ONNX session; otherwise the stub is used.
pub fn load_backend(config: &ModelConfig) -> Result<Box<dyn InferenceBackend>> {
    config.validate()?;
    match &config.model_path {
        Some(path) => {
            let backend = OrtBackend::load(path, config)?;
            Ok(Box::new(backend))
        }
        None => {
            info!("no model path configured, using stub backend");
            Ok(Box::new(StubBackend::from_config(config)))
        }
    }
}

/// Make sure a tensor matches the model input edge.
pub(crate) fn check_input(descriptor: &ModelDescriptor, input: &Tensor) -> Result<()> {
    let expected = descriptor.input_size as usize;
    if input.size() != expected {
        return Err(InferenceError::InputSize {
            expected,
            actual: input.size(),
        });
    }
    Ok(())
}
