//! # vigil-pipeline
//!
//! Drives frames through preprocess → inference → decode → NMS → relevance
//! filtering inside an isolated worker task.
//!
//! ```no_run
//! use vigil_frame::Frame;
//! use vigil_pipeline::{spawn, Event, PipelineConfig};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let (handle, mut events) = spawn(PipelineConfig::default());
//! handle.submit(Frame::new(1, 640, 480, vec![0u8; 640 * 480 * 4]))?;
//! while let Some(event) = events.next().await {
//!     if let Event::DetectionResults { frame_id, detections, .. } = &event {
//!         println!("{frame_id}: {} detections", detections.len());
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The same stages are available synchronously through [`DetectionPipeline`]
//! for callers that manage their own threading.

mod config;
mod error;
mod message;
mod pipeline;
mod worker;

pub use config::{ConfigError, PipelineConfig};
pub use error::{PipelineError, Result};
pub use message::{Event, PipelineStats};
pub use pipeline::DetectionPipeline;
pub use worker::{spawn, spawn_with_backend, EventStream, PipelineHandle};

// the types callers need to talk to the worker
pub use vigil_detect::{Detection, ThresholdUpdate, Thresholds};
pub use vigil_frame::{Frame, FrameId, OverflowPolicy};
pub use vigil_model::{ModelConfig, ModelDescriptor};
