#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal Worker
//!
//! A single-flight processing queue for image background removal against
//! one shared, expensive-to-initialize inference session.
//!
//! The worker accepts `init` and `process` messages from a host context,
//! serializes requests through a strictly FIFO queue, lazily initializes
//! the model/processor handle pair on first use, and recreates the pair
//! when a session-fatal failure is detected. Completions and failures are
//! reported as outbound events correlated by the caller-supplied index.
//!
//! The inference runtime itself is an external capability behind the
//! [`InferenceRuntime`] trait; compositing and PNG encoding are done
//! in-crate with the `image` crate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_worker::{ImageWorker, WorkerConfig, WorkerEvent, WorkerMessage};
//! use bgremove_worker::testing::MockRuntime;
//! use tokio::sync::mpsc;
//!
//! # async fn example(image_bytes: Vec<u8>) {
//! let (event_tx, mut event_rx) = mpsc::unbounded_channel();
//! let (message_tx, message_rx) = mpsc::unbounded_channel();
//!
//! let config = WorkerConfig::builder()
//!     .model_id("briaai/RMBG-1.4")
//!     .build()
//!     .unwrap();
//! let worker = ImageWorker::new(MockRuntime::new(), config, event_tx);
//! tokio::spawn(worker.run(message_rx));
//!
//! message_tx.send(WorkerMessage::Init).unwrap();
//! message_tx
//!     .send(WorkerMessage::Process { image: image_bytes, index: 0 })
//!     .unwrap();
//!
//! while let Some(event) = event_rx.recv().await {
//!     if let WorkerEvent::ProcessComplete { result } = event {
//!         println!("index {} done: {} bytes", result.index, result.processed_image.png.len());
//!         break;
//!     }
//! }
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod mask;
pub mod queue;
pub mod runtime;
pub mod session;
pub mod testing;
pub mod worker;

// Public API exports
pub use config::{
    PreprocessingConfig, ProgressGranularity, ResampleFilter, WorkerConfig, WorkerConfigBuilder,
    DEFAULT_MODEL_ID,
};
pub use error::{Result, WorkerError};
pub use events::{
    EventSink, ProcessResult, ProcessedImage, ProcessingTimings, WorkerEvent, WorkerMessage,
};
pub use mask::SegmentationMask;
pub use queue::{Request, RequestQueue};
pub use runtime::{InferenceRuntime, LoadProgress};
pub use session::SessionManager;
pub use worker::ImageWorker;
