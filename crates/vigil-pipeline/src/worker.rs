// vigil-pipeline/src/worker.rs
// ------------------------------------------------------------
// The isolated worker: one tokio task owns the queue, the
// thresholds and the pipeline.  Callers talk to it only
// through channels.
//
//   handle ──Command──▶ worker ──Event──▶ EventStream
//
// Frames are strictly serialized: a frame's terminal event is
// emitted before the next frame leaves the queue.  A run that
// outlives its timeout is parked and awaited before the next
// frame starts, so at most one blocking run exists at a time.
// ------------------------------------------------------------
use crate::message::{Command, Event, PipelineStats};
use crate::{DetectionPipeline, PipelineConfig, PipelineError, Result};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use vigil_detect::{Detection, ThresholdStore, ThresholdUpdate};
use vigil_frame::{Frame, FrameQueue, Pushed};
use vigil_model::{load_backend, InferenceBackend, InferenceError, ModelDescriptor, StubBackend};

/// Cloneable sender side of the worker.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl PipelineHandle {
    /// Queue a frame; never blocks.  The outcome arrives as an event.
    pub fn submit(&self, frame: Frame) -> Result<()> {
        self.send(Command::Submit(frame))
    }

    /// Change thresholds; acknowledged by [`Event::ThresholdsUpdated`].
    pub fn update_thresholds(&self, update: ThresholdUpdate) -> Result<()> {
        self.send(Command::UpdateThresholds(update))
    }

    /// Descriptor of the active model, `None` when no model could be loaded.
    pub async fn model_info(&self) -> Result<Option<ModelDescriptor>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ModelInfo(tx))?;
        rx.await.map_err(|_| PipelineError::Closed)
    }

    pub async fn stats(&self) -> Result<PipelineStats> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stats(tx))?;
        rx.await.map_err(|_| PipelineError::Closed)
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.tx.send(cmd).map_err(|_| PipelineError::Closed)
    }
}

/// Receiving side of the worker's events.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Next event; `None` once the worker has exited and everything was read.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Next event if one is already waiting.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Adapt into a `futures` stream.
    pub fn into_stream(self) -> UnboundedReceiverStream<Event> {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Start a worker that loads its backend from `config.model`.
///
/// Must be called from within a tokio runtime.  The worker emits
/// `ModelLoaded` or `ModelError` once, then serves commands until every
/// handle is dropped and the queue has drained.
pub fn spawn(config: PipelineConfig) -> (PipelineHandle, EventStream) {
    start(config, None)
}

/// Start a worker around an already constructed backend.
pub fn spawn_with_backend(config: PipelineConfig, backend: Box<dyn InferenceBackend>) -> (PipelineHandle, EventStream) {
    start(config, Some(backend))
}

fn start(config: PipelineConfig, backend: Option<Box<dyn InferenceBackend>>) -> (PipelineHandle, EventStream) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let worker = Worker {
        queue: FrameQueue::new(config.queue_capacity, config.overflow),
        thresholds: ThresholdStore::new(config.initial_thresholds),
        config,
        commands: cmd_rx,
        events: event_tx,
        pipeline: None,
        descriptor: None,
        stats: PipelineStats::default(),
        stalled: None,
        open: true,
    };
    tokio::spawn(worker.run(backend));

    (PipelineHandle { tx: cmd_tx }, EventStream { rx: event_rx })
}

struct Worker {
    config: PipelineConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<Event>,
    queue: FrameQueue,
    thresholds: ThresholdStore,
    pipeline: Option<Arc<Mutex<DetectionPipeline>>>,
    descriptor: Option<ModelDescriptor>,
    stats: PipelineStats,
    /// Blocking run whose frame already timed out; still owns the pipeline.
    stalled: Option<JoinHandle<Result<Vec<Detection>>>>,
    open: bool,
}

impl Worker {
    async fn run(mut self, backend: Option<Box<dyn InferenceBackend>>) {
        match backend {
            Some(backend) => self.install(backend, true),
            None => self.load().await,
        }

        loop {
            // backlog first: a finished frame goes straight to the next one
            if let Some(frame) = self.queue.pop() {
                self.process(frame).await;
                continue;
            }
            if !self.open {
                break;
            }
            match self.commands.recv().await {
                Some(cmd) => self.handle(cmd),
                None => self.open = false,
            }
        }

        info!(
            "detection worker exiting: {} completed, {} failed, {} dropped",
            self.stats.completed, self.stats.failed, self.stats.dropped
        );
    }

    /// Load the configured backend off the async thread.
    async fn load(&mut self) {
        let model = self.config.model.clone();
        let loaded = tokio::task::spawn_blocking(move || load_backend(&model)).await;
        let failure = match loaded {
            Ok(Ok(backend)) => {
                self.install(backend, true);
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(join) => format!("model loader panicked: {join}"),
        };

        error!("model load failed: {failure}");
        if self.config.fallback_to_stub && self.config.model.input_size > 0 {
            warn!("continuing on the stub backend");
            self.emit(Event::ModelError {
                message: format!("{failure}; falling back to stub backend"),
            });
            self.install(Box::new(StubBackend::from_config(&self.config.model)), false);
        } else {
            self.emit(Event::ModelError { message: failure });
        }
    }

    fn install(&mut self, backend: Box<dyn InferenceBackend>, announce: bool) {
        let pipeline = DetectionPipeline::new(backend);
        let descriptor = pipeline.descriptor().clone();
        info!(
            "pipeline ready: {} v{} ({}x{}, stub: {})",
            descriptor.name, descriptor.version, descriptor.input_size, descriptor.input_size, descriptor.is_stub
        );
        if announce {
            self.emit(Event::ModelLoaded {
                descriptor: descriptor.clone(),
            });
        }
        self.descriptor = Some(descriptor);
        self.pipeline = Some(Arc::new(Mutex::new(pipeline)));
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Submit(frame) => self.enqueue(frame),
            Command::UpdateThresholds(update) => {
                let current = self.thresholds.update(update);
                self.emit(Event::thresholds(current));
            }
            Command::ModelInfo(reply) => {
                let _ = reply.send(self.descriptor.clone());
            }
            Command::Stats(reply) => {
                let mut stats = self.stats;
                stats.queued = self.queue.len();
                let _ = reply.send(stats);
            }
        }
    }

    fn enqueue(&mut self, frame: Frame) {
        self.stats.submitted += 1;
        if self.pipeline.is_none() {
            self.fail(&frame, &PipelineError::ModelNotLoaded);
            return;
        }
        match self.queue.push(frame) {
            Pushed::Queued => {}
            Pushed::Evicted(lost) | Pushed::Rejected(lost) => {
                self.stats.dropped += 1;
                let err = PipelineError::QueueFull {
                    capacity: self.queue.capacity(),
                };
                self.fail(&lost, &err);
            }
        }
    }

    /// Run one frame to its terminal event while still serving commands.
    async fn process(&mut self, frame: Frame) {
        let Some(pipeline) = self.pipeline.clone() else {
            self.fail(&frame, &PipelineError::ModelNotLoaded);
            return;
        };

        // the frame's clock starts only once the pipeline is free
        if let Some(stalled) = self.stalled.take() {
            self.settle(stalled).await;
        }

        // thresholds are fixed for the whole frame; later updates wait for the next
        let thresholds = self.thresholds.get();
        let timeout = self.config.inference_timeout();
        let (id, timestamp) = (frame.id(), frame.submitted_at_ms());
        let started = Instant::now();

        let mut job = tokio::task::spawn_blocking(move || {
            // a panicked stage leaves the pipeline itself usable
            let mut pipeline = pipeline.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            pipeline.run(&frame, thresholds)
        });
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let finished = loop {
            tokio::select! {
                res = &mut job => break Some(res),
                _ = &mut deadline => break None,
                cmd = self.commands.recv(), if self.open => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => self.open = false,
                },
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = match finished {
            Some(Ok(outcome)) => outcome,
            Some(Err(join)) => Err(PipelineError::Panicked(join.to_string())),
            None => {
                self.stats.timed_out += 1;
                warn!("frame {id} timed out after {timeout:?}");
                self.stalled = Some(job);
                Err(PipelineError::Inference(InferenceError::Timeout(timeout)))
            }
        };

        match result {
            Ok(detections) => {
                self.stats.completed += 1;
                debug!("frame {id}: {} detections in {elapsed_ms} ms", detections.len());
                self.emit(Event::DetectionResults {
                    frame_id: id,
                    timestamp,
                    detections,
                    elapsed_ms,
                });
            }
            Err(err) => {
                warn!("frame {id} failed: {err}");
                self.stats.failed += 1;
                self.emit(Event::Error {
                    frame_id: Some(id),
                    timestamp: Some(timestamp),
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        }
    }

    /// Wait out a timed-out run while still serving commands.
    async fn settle(&mut self, mut stalled: JoinHandle<Result<Vec<Detection>>>) {
        info!("waiting for a timed-out inference to release the pipeline");
        let started = Instant::now();
        loop {
            tokio::select! {
                _ = &mut stalled => break,
                cmd = self.commands.recv(), if self.open => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => self.open = false,
                },
            }
        }
        debug!("pipeline released after {:.2?}", started.elapsed());
    }

    fn fail(&mut self, frame: &Frame, err: &PipelineError) {
        warn!("frame {} rejected: {err}", frame.id());
        if !matches!(err, PipelineError::QueueFull { .. }) {
            self.stats.failed += 1;
        }
        self.emit(Event::frame_failed(frame, err));
    }

    fn emit(&self, event: Event) {
        // a dropped EventStream only means nobody is listening
        let _ = self.events.send(event);
    }
}
