//! Message-passing boundary between the host context and the worker
//!
//! Inbound [`WorkerMessage`]s enqueue work or request initialization;
//! outbound [`WorkerEvent`]s report loading progress, completions, and
//! failures. Both sides are serde-serializable so the boundary can cross a
//! process or wire boundary unchanged.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Inbound messages accepted by the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerMessage {
    /// Trigger session initialization unconditionally
    Init,
    /// Enqueue an image for background removal and trigger a drain attempt
    #[serde(rename_all = "camelCase")]
    Process {
        /// Encoded image bytes (any format the `image` crate decodes)
        image: Vec<u8>,
        /// Caller-supplied correlation index, echoed back on completion
        index: u64,
    },
}

/// Outbound events emitted by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerEvent {
    /// Session initialization completed successfully
    ModelLoaded,
    /// Incremental initialization progress
    #[serde(rename_all = "camelCase")]
    LoadingProgress {
        /// Percentage in `0..=100`, non-decreasing within one initialization
        progress: u8,
        /// Human-readable stage label
        stage: String,
    },
    /// A request was fully processed
    #[serde(rename_all = "camelCase")]
    ProcessComplete {
        /// The processed image and its correlation index
        result: ProcessResult,
    },
    /// A failure occurred during initialization or processing
    #[serde(rename_all = "camelCase")]
    Error {
        /// Descriptive failure message
        error: String,
    },
}

/// Completion payload correlated back to the originating request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    /// The composited image with the background removed
    pub processed_image: ProcessedImage,
    /// Correlation index from the originating `Process` message
    pub index: u64,
    /// Per-stage processing timings
    pub timings: ProcessingTimings,
}

/// A background-removed image, PNG-encoded with an alpha channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    /// PNG-encoded RGBA pixels
    pub png: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

/// Detailed timing breakdown for one processed request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingTimings {
    /// Image decode time (ms)
    pub decode_ms: u64,
    /// Input preparation time (ms)
    pub preprocessing_ms: u64,
    /// Model inference time (ms)
    pub inference_ms: u64,
    /// Mask generation and compositing time (ms)
    pub postprocessing_ms: u64,
    /// PNG encode time (ms)
    pub encode_ms: u64,
    /// End-to-end time for the request (ms)
    pub total_ms: u64,
}

/// Outbound event channel handed to the worker.
///
/// Sending never fails from the worker's perspective: if the host dropped
/// its receiver the event is discarded, because no failure on the event
/// path may stall request handling.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl EventSink {
    /// Wrap an unbounded sender as an event sink
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self { tx }
    }

    /// Emit an event toward the host context
    pub fn emit(&self, event: WorkerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped; discarding worker event");
        }
    }
}
