//! Mock inference runtime for tests
//!
//! Provides a scriptable [`InferenceRuntime`] implementation so queueing,
//! session lifecycle, and drain behavior can be tested without model files
//! or an actual inference engine. State is shared behind an [`MockProbe`]
//! so tests can inspect and script the runtime after the worker has taken
//! ownership of it.

use crate::config::PreprocessingConfig;
use crate::error::{Result, WorkerError};
use crate::runtime::{InferenceRuntime, LoadProgress};
use image::DynamicImage;
use ndarray::Array4;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Spatial size of the mock's input and output tensors
const MOCK_TENSOR_SIZE: usize = 64;

#[derive(Default)]
struct MockState {
    call_history: Vec<String>,
    model_loads: usize,
    processor_loads: usize,
    infer_calls: usize,
    in_flight: usize,
    max_in_flight: usize,
    fail_model_load: Option<String>,
    fail_processor_load: Option<String>,
    infer_outcomes: VecDeque<Option<WorkerError>>,
}

/// Opaque model handle produced by the mock runtime
#[derive(Debug, Clone)]
pub struct MockModel {
    /// Identifier the handle was loaded for
    pub model_id: String,
    /// Which initialization produced this handle (1-based)
    pub generation: usize,
}

/// Opaque processor handle produced by the mock runtime
#[derive(Debug, Clone)]
pub struct MockProcessor {
    /// Target size the processor was configured with
    pub target_size: [u32; 2],
}

/// Scriptable mock runtime
pub struct MockRuntime {
    state: Arc<Mutex<MockState>>,
}

/// Shared-state handle for inspecting and scripting a [`MockRuntime`]
#[derive(Clone)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

impl MockRuntime {
    /// Create a new mock runtime with no scripted failures
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Get a probe sharing this runtime's state
    #[must_use]
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            state: Arc::clone(&self.state),
        }
    }

    /// Fail the next `load_model` call with the given message
    pub fn fail_model_load<S: Into<String>>(&mut self, msg: S) {
        self.state.lock().unwrap().fail_model_load = Some(msg.into());
    }

    /// Fail the next `load_processor` call with the given message
    pub fn fail_processor_load<S: Into<String>>(&mut self, msg: S) {
        self.state.lock().unwrap().fail_processor_load = Some(msg.into());
    }

    /// Script the outcome of the next unscripted `infer` call.
    ///
    /// Outcomes are consumed in order, one per call; calls beyond the
    /// scripted list succeed.
    pub fn push_infer_outcome(&mut self, outcome: Option<WorkerError>) {
        self.state.lock().unwrap().infer_outcomes.push_back(outcome);
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProbe {
    /// Number of `load_model` calls so far
    #[must_use]
    pub fn model_loads(&self) -> usize {
        self.state.lock().unwrap().model_loads
    }

    /// Number of `load_processor` calls so far
    #[must_use]
    pub fn processor_loads(&self) -> usize {
        self.state.lock().unwrap().processor_loads
    }

    /// Number of `infer` calls so far
    #[must_use]
    pub fn infer_calls(&self) -> usize {
        self.state.lock().unwrap().infer_calls
    }

    /// Highest number of concurrently running `infer` calls observed
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    /// Ordered record of runtime calls
    #[must_use]
    pub fn call_history(&self) -> Vec<String> {
        self.state.lock().unwrap().call_history.clone()
    }

    /// Script the outcome of the next unscripted `infer` call
    pub fn push_infer_outcome(&self, outcome: Option<WorkerError>) {
        self.state.lock().unwrap().infer_outcomes.push_back(outcome);
    }

    /// Fail the next `load_model` call with the given message
    pub fn fail_model_load<S: Into<String>>(&self, msg: S) {
        self.state.lock().unwrap().fail_model_load = Some(msg.into());
    }
}

/// Generate a circular soft-edged mock mask, matching what a segmentation
/// model would plausibly emit
fn mock_mask_tensor() -> Array4<f32> {
    let size = MOCK_TENSOR_SIZE;
    let mut output = Array4::<f32>::zeros((1, 1, size, size));
    let center = size as f32 / 2.0;
    let radius = size as f32 / 3.0;

    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance < radius {
                output[[0, 0, y, x]] = ((radius - distance) / radius).clamp(0.0, 1.0);
            }
        }
    }

    output
}

#[async_trait::async_trait]
impl InferenceRuntime for MockRuntime {
    type Model = MockModel;
    type Processor = MockProcessor;

    async fn load_model(
        &mut self,
        model_id: &str,
        on_progress: LoadProgress<'_>,
    ) -> Result<MockModel> {
        let generation = {
            let mut state = self.state.lock().unwrap();
            state.call_history.push(format!("load_model({model_id})"));
            state.model_loads += 1;
            if let Some(msg) = state.fail_model_load.take() {
                return Err(WorkerError::processing(msg));
            }
            state.model_loads
        };

        on_progress(0, "downloading model");
        tokio::task::yield_now().await;
        on_progress(60, "downloading model");
        on_progress(100, "model ready");

        Ok(MockModel {
            model_id: model_id.to_string(),
            generation,
        })
    }

    async fn load_processor(
        &mut self,
        model_id: &str,
        config: &PreprocessingConfig,
        on_progress: LoadProgress<'_>,
    ) -> Result<MockProcessor> {
        {
            let mut state = self.state.lock().unwrap();
            state
                .call_history
                .push(format!("load_processor({model_id})"));
            state.processor_loads += 1;
            if let Some(msg) = state.fail_processor_load.take() {
                return Err(WorkerError::processing(msg));
            }
        }

        on_progress(50, "fetching processor config");
        tokio::task::yield_now().await;
        on_progress(100, "processor ready");

        Ok(MockProcessor {
            target_size: config.target_size,
        })
    }

    async fn prepare_input(
        &mut self,
        _processor: &MockProcessor,
        _image: &DynamicImage,
    ) -> Result<Array4<f32>> {
        self.state
            .lock()
            .unwrap()
            .call_history
            .push("prepare_input".to_string());
        tokio::task::yield_now().await;
        Ok(Array4::zeros((1, 3, MOCK_TENSOR_SIZE, MOCK_TENSOR_SIZE)))
    }

    async fn infer(
        &mut self,
        _model: &mut MockModel,
        _input: &Array4<f32>,
    ) -> Result<Array4<f32>> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.call_history.push("infer".to_string());
            state.infer_calls += 1;
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.infer_outcomes.pop_front().flatten()
        };

        // Suspension point: the drain loop must still never overlap calls
        tokio::task::yield_now().await;
        self.state.lock().unwrap().in_flight -= 1;

        match outcome {
            Some(err) => Err(err),
            None => Ok(mock_mask_tensor()),
        }
    }
}
