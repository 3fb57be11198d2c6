//! Single-flight image worker
//!
//! Owns the session, the request queue, and the busy flag, and drives the
//! drain loop: while the busy flag is clear, dequeue the head request, run
//! it through the shared session, emit a completion or error event, and
//! repeat until the queue is empty. The busy flag is released on every exit
//! path, so no failure can stall the loop.

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::events::{EventSink, ProcessResult, ProcessedImage, ProcessingTimings, WorkerEvent, WorkerMessage};
use crate::mask;
use crate::queue::{Request, RequestQueue};
use crate::runtime::InferenceRuntime;
use crate::session::SessionManager;
use image::GenericImageView;
use instant::Instant;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// Background-removal worker serializing requests through one shared session
pub struct ImageWorker<R: InferenceRuntime> {
    runtime: R,
    config: WorkerConfig,
    session: SessionManager<R>,
    queue: RequestQueue,
    busy: bool,
    events: EventSink,
}

impl<R: InferenceRuntime> ImageWorker<R> {
    /// Create a worker that reports events on the given channel
    #[must_use]
    pub fn new(runtime: R, config: WorkerConfig, events: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self {
            runtime,
            config,
            session: SessionManager::new(),
            queue: RequestQueue::new(),
            busy: false,
            events: EventSink::new(events),
        }
    }

    /// Handle one inbound message
    pub async fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Init => self.init().await,
            WorkerMessage::Process { image, index } => {
                self.enqueue(image, index);
                self.drain().await;
            },
        }
    }

    /// Consume messages from the channel until the host closes it
    pub async fn run(mut self, mut messages: mpsc::UnboundedReceiver<WorkerMessage>) {
        while let Some(message) = messages.recv().await {
            self.handle_message(message).await;
        }
        debug!("message channel closed; worker stopping");
    }

    /// Append a request to the queue without draining
    pub fn enqueue(&mut self, image: Vec<u8>, index: u64) {
        self.queue.enqueue(Request { image, index });
    }

    /// Number of pending requests
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Whether a request is currently in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether the session's handle pair exists
    #[must_use]
    pub fn is_session_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Handle an `Init` message: trigger session initialization.
    ///
    /// When the session already exists this re-announces `ModelLoaded`
    /// without acquiring handles again, so `Init` is observably idempotent.
    async fn init(&mut self) {
        if self.session.is_ready() {
            self.events.emit(WorkerEvent::ModelLoaded);
            return;
        }
        if let Err(err) = self
            .session
            .ensure_session(&mut self.runtime, &self.config, &self.events)
            .await
        {
            self.events.emit(WorkerEvent::Error {
                error: err.to_string(),
            });
        }
    }

    /// Process queued requests one at a time until the queue is empty.
    ///
    /// Reentrant-safe: a no-op while a request is already in flight or the
    /// queue is empty. Results are emitted in enqueue order because exactly
    /// one request runs at a time.
    pub async fn drain(&mut self) {
        if self.busy {
            return;
        }

        while !self.queue.is_empty() {
            self.busy = true;
            let request = match self.queue.dequeue_front() {
                Ok(request) => request,
                Err(_) => {
                    self.busy = false;
                    break;
                },
            };
            let index = request.index;

            match self.process_one(request).await {
                Ok(result) => self.events.emit(WorkerEvent::ProcessComplete { result }),
                Err(error) => {
                    warn!(index, %error, "request failed");
                    self.events.emit(WorkerEvent::Error {
                        error: error.to_string(),
                    });
                    if error.is_session_fatal() {
                        // The next request needs the session immediately;
                        // recreate it eagerly rather than lazily.
                        self.session.invalidate();
                        if let Err(init_err) = self
                            .session
                            .ensure_session(&mut self.runtime, &self.config, &self.events)
                            .await
                        {
                            self.events.emit(WorkerEvent::Error {
                                error: init_err.to_string(),
                            });
                        }
                    }
                },
            }

            // Guaranteed release: the flag never outlives one request
            self.busy = false;
        }
    }

    /// Run one dequeued request through the session: lazy init, decode,
    /// prepare, infer, composite, encode
    #[instrument(skip(self, request), fields(index = request.index))]
    async fn process_one(&mut self, request: Request) -> Result<ProcessResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        self.session
            .ensure_session(&mut self.runtime, &self.config, &self.events)
            .await?;

        let decode_start = Instant::now();
        let image = image::load_from_memory(&request.image)?;
        let dimensions = image.dimensions();
        timings.decode_ms = decode_start.elapsed().as_millis() as u64;

        let (model, processor) = self.session.handles_mut()?;

        let preprocess_start = Instant::now();
        let input = self.runtime.prepare_input(processor, &image).await?;
        timings.preprocessing_ms = preprocess_start.elapsed().as_millis() as u64;

        let inference_start = Instant::now();
        let output = self.runtime.infer(model, &input).await?;
        timings.inference_ms = inference_start.elapsed().as_millis() as u64;

        let postprocess_start = Instant::now();
        let segmentation = mask::tensor_to_mask(&output, dimensions)?;
        let composited = mask::composite_alpha(&image, &segmentation)?;
        timings.postprocessing_ms = postprocess_start.elapsed().as_millis() as u64;

        let encode_start = Instant::now();
        let png = mask::encode_png(&composited)?;
        timings.encode_ms = encode_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        debug!(
            index = request.index,
            width = dimensions.0,
            height = dimensions.1,
            total_ms = timings.total_ms,
            "request processed"
        );

        Ok(ProcessResult {
            processed_image: ProcessedImage {
                png,
                width: dimensions.0,
                height: dimensions.1,
            },
            index: request.index,
            timings,
        })
    }
}
