//! Inference runtime abstraction
//!
//! The model runtime is an opaque external capability: the worker only
//! needs to acquire a model/processor handle pair, prepare inputs, and run
//! inference. Everything behind those calls (downloads, execution
//! providers, tensor math) belongs to the runtime implementation.

use crate::config::PreprocessingConfig;
use crate::error::Result;
use image::DynamicImage;
use ndarray::Array4;

/// Progress callback invoked during handle loading with a percentage in
/// `0..=100` and a human-readable stage label
pub type LoadProgress<'a> = &'a mut (dyn FnMut(u8, &str) + Send);

/// External inference capability consumed by the worker.
///
/// Handle types are opaque to the worker; it only stores them as a paired
/// session and threads them back into `prepare_input` and `infer`.
#[async_trait::async_trait]
pub trait InferenceRuntime: Send {
    /// Opaque model handle produced by `load_model`
    type Model: Send;
    /// Opaque processor handle produced by `load_processor`
    type Processor: Send;

    /// Acquire a model handle for the given identifier
    ///
    /// # Errors
    /// - Model download or deserialization failures
    /// - Execution provider initialization failures
    async fn load_model(
        &mut self,
        model_id: &str,
        on_progress: LoadProgress<'_>,
    ) -> Result<Self::Model>;

    /// Acquire a processor handle configured with the given preprocessing
    ///
    /// # Errors
    /// - Processor configuration download failures
    /// - Invalid preprocessing parameters for the model
    async fn load_processor(
        &mut self,
        model_id: &str,
        config: &PreprocessingConfig,
        on_progress: LoadProgress<'_>,
    ) -> Result<Self::Processor>;

    /// Prepare a decoded image into the model's NCHW input tensor
    ///
    /// # Errors
    /// - Resize or normalization failures
    async fn prepare_input(
        &mut self,
        processor: &Self::Processor,
        image: &DynamicImage,
    ) -> Result<Array4<f32>>;

    /// Run inference, returning a `1x1xHxW` opacity mask tensor in `[0, 1]`
    ///
    /// # Errors
    /// - Inference execution failures
    /// - `WorkerError::SessionInvalid` when the session must be recreated
    async fn infer(&mut self, model: &mut Self::Model, input: &Array4<f32>)
        -> Result<Array4<f32>>;
}
