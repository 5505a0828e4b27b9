//! Pipeline configuration.
//!
//! Everything has a default so a config file only needs the keys it changes:
//!
//! ```json
//! { "model": { "model_path": "models/yolov8n.onnx" }, "queue_capacity": 8 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use vigil_detect::Thresholds;
use vigil_frame::OverflowPolicy;
use vigil_model::ModelConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration for the detection worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Backend selection and model geometry
    pub model: ModelConfig,
    /// Frames allowed to wait for the scheduler
    pub queue_capacity: usize,
    /// What happens to a frame that arrives at a full queue
    pub overflow: OverflowPolicy,
    /// Upper bound on one frame's preprocess → filter run
    pub inference_timeout_ms: u64,
    /// Keep running on the stub backend when the model fails to load
    pub fallback_to_stub: bool,
    /// Thresholds in force before the first update
    pub initial_thresholds: Thresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            queue_capacity: 32,
            overflow: OverflowPolicy::DropOldest,
            inference_timeout_ms: 5_000,
            fallback_to_stub: true,
            initial_thresholds: Thresholds::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.overflow, OverflowPolicy::DropOldest);
        assert_eq!(config.inference_timeout(), Duration::from_secs(5));
        assert!(config.fallback_to_stub);
        assert_eq!(config.initial_thresholds, Thresholds { confidence: 0.5, nms: 0.4 });
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "model": {{ "input_size": 320 }}, "overflow": "reject_newest", "initial_thresholds": {{ "confidence": 0.6, "nms": 0.45 }} }}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.model.input_size, 320);
        assert_eq!(config.model.input_name, "images");
        assert_eq!(config.overflow, OverflowPolicy::RejectNewest);
        assert_eq!(config.initial_thresholds.confidence, 0.6);
        assert_eq!(config.queue_capacity, 32);
    }

    #[test]
    fn missing_and_broken_files_report_path() {
        let missing = PipelineConfig::from_json_file("/nonexistent/vigil.json");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let broken = PipelineConfig::from_json_file(file.path());
        assert!(matches!(broken, Err(ConfigError::Parse { .. })));
    }
}
