use thiserror::Error;
use vigil_detect::PostprocessError;
use vigil_model::InferenceError;
use vigil_preprocess::PreprocessError;

/// Anything that can end a frame's trip through the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Model not loaded")]
    ModelNotLoaded,
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Postprocess(#[from] PostprocessError),
    #[error("Frame queue full (capacity {capacity}), frame dropped")]
    QueueFull { capacity: usize },
    #[error("Pipeline stage panicked: {0}")]
    Panicked(String),
    #[error("Pipeline worker has shut down")]
    Closed,
}

impl PipelineError {
    /// Stable error category reported in `error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ModelNotLoaded => "ModelNotLoadedError",
            PipelineError::Preprocess(_) => "PreprocessingError",
            PipelineError::Inference(_) | PipelineError::Panicked(_) => "InferenceError",
            PipelineError::Postprocess(_) => "PostprocessingError",
            PipelineError::QueueFull { .. } => "QueueFullError",
            PipelineError::Closed => "ClosedError",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
