//! Proctoring detection demo
//!
//! Feeds still images (or synthetic frames) through the detection worker and
//! prints every event it emits as one JSON object per line.
//!
//! Usage:
//!   cargo run -p demos --bin proctor_demo -- --frames 10
//!   cargo run -p demos --bin proctor_demo -- --model models/yolov8n.onnx desk.jpg phone.png
//!   RUST_LOG=debug cargo run -p demos --bin proctor_demo -- --config vigil.json

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use tokio_stream::StreamExt;
use vigil_pipeline::{spawn, Frame, PipelineConfig, ThresholdUpdate};

#[derive(Parser, Debug)]
#[command(about = "Run frames through the proctoring detector and print JSON events")]
struct Args {
    /// Image files to submit, in order
    images: Vec<PathBuf>,

    /// JSON pipeline config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// ONNX detector to load instead of the stub backend
    #[arg(long)]
    model: Option<PathBuf>,

    #[arg(long)]
    input_size: Option<u32>,

    /// Confidence threshold sent once the model is up
    #[arg(long)]
    confidence: Option<f32>,

    /// IoU threshold sent once the model is up
    #[arg(long)]
    nms: Option<f32>,

    #[arg(long)]
    queue_capacity: Option<usize>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Seed the stub backend for repeatable output
    #[arg(long)]
    seed: Option<u64>,

    /// Synthetic frames to submit when no images are given
    #[arg(long, default_value = "5")]
    frames: u64,

    /// Synthetic frame size as WIDTHxHEIGHT
    #[arg(long, default_value = "640x480")]
    size: String,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(path) = &self.model {
            config.model.model_path = Some(path.clone());
        }
        if let Some(size) = self.input_size {
            config.model.input_size = size;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(ms) = self.timeout_ms {
            config.inference_timeout_ms = ms;
        }
        if self.seed.is_some() {
            config.model.stub_seed = self.seed;
        }
        Ok(config)
    }

    fn synthetic_size(&self) -> Result<(u32, u32)> {
        let (w, h) = self
            .size
            .split_once('x')
            .with_context(|| format!("bad --size {:?}, expected WIDTHxHEIGHT", self.size))?;
        Ok((w.trim().parse()?, h.trim().parse()?))
    }
}

fn load_image(id: u64, path: &PathBuf) -> Result<Frame> {
    let rgba = image::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok(Frame::new(id, w, h, rgba.into_raw()))
}

/// Diagonal gradient so every frame has some structure to it.
fn synthetic_frame(id: u64, width: u32, height: u32) -> Frame {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = ((x + y + id as u32 * 16) % 256) as u8;
            pixels.extend_from_slice(&[v, v / 2, 255 - v, 255]);
        }
    }
    Frame::new(id, width, height, pixels)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.pipeline_config()?;
    info!(
        "starting worker: model {:?}, input {}px, queue {}",
        config.model.model_path, config.model.input_size, config.queue_capacity
    );

    let (handle, events) = spawn(config);

    if args.confidence.is_some() || args.nms.is_some() {
        handle.update_thresholds(ThresholdUpdate {
            confidence: args.confidence,
            nms: args.nms,
        })?;
    }

    let mut submitted = 0u64;
    if args.images.is_empty() {
        let (w, h) = args.synthetic_size()?;
        for id in 1..=args.frames {
            handle.submit(synthetic_frame(id, w, h))?;
            submitted += 1;
        }
    } else {
        for (i, path) in args.images.iter().enumerate() {
            match load_image(i as u64 + 1, path) {
                Ok(frame) => {
                    handle.submit(frame)?;
                    submitted += 1;
                }
                Err(e) => warn!("skipping {}: {e:#}", path.display()),
            }
        }
    }
    info!("submitted {submitted} frames");

    let mut events = events.into_stream();
    let mut settled = 0u64;
    while settled < submitted {
        let Some(event) = events.next().await else {
            break;
        };
        if event.is_terminal() {
            settled += 1;
        }
        println!("{}", serde_json::to_string(&event)?);
    }

    let stats = handle.stats().await?;
    info!(
        "done: {} completed, {} failed, {} dropped, {} timed out",
        stats.completed, stats.failed, stats.dropped, stats.timed_out
    );
    Ok(())
}
