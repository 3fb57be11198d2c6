//! Worker and preprocessing configuration
//!
//! One `WorkerConfig` parameterizes everything that used to require a
//! separate worker build per model: the model identifier, the preprocessing
//! applied when acquiring the processor handle, and how granular the
//! loading-progress events are.

use crate::error::{Result, WorkerError};
use serde::{Deserialize, Serialize};

/// Default model identifier used when none is configured
pub const DEFAULT_MODEL_ID: &str = "briaai/RMBG-1.4";

/// Resampling policy applied when resizing inputs to the model resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    /// Nearest-neighbor sampling
    Nearest,
    /// Bilinear interpolation
    Bilinear,
    /// Bicubic interpolation
    Bicubic,
}

/// Preprocessing configuration forwarded to the runtime when the processor
/// handle is acquired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Apply per-channel mean/std normalization
    pub do_normalize: bool,
    /// Pad to the target size instead of stretching
    pub do_pad: bool,
    /// Rescale raw pixel values by `rescale_factor`
    pub do_rescale: bool,
    /// Resize inputs to `target_size`
    pub do_resize: bool,
    /// Multiplier applied to raw pixel values before normalization
    pub rescale_factor: f32,
    /// Model input resolution as `[width, height]`
    pub target_size: [u32; 2],
    /// Resampling policy for the resize step
    pub resample: ResampleFilter,
    /// Per-channel normalization mean
    pub normalization_mean: [f32; 3],
    /// Per-channel normalization standard deviation
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        // RMBG-1.4 preprocessing: normalize around 0.5, no padding, rescale
        // 8-bit values into [0,1], stretch to a 1024x1024 input.
        Self {
            do_normalize: true,
            do_pad: false,
            do_rescale: true,
            do_resize: true,
            rescale_factor: 1.0 / 255.0,
            target_size: [1024, 1024],
            resample: ResampleFilter::Bilinear,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

/// Granularity of `LoadingProgress` events during session initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressGranularity {
    /// Report only the model/processor stage boundaries
    Coarse,
    /// Forward every progress callback from the runtime
    Fine,
}

/// Configuration for an [`ImageWorker`](crate::worker::ImageWorker)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Model identifier passed to the runtime for both handle acquisitions
    pub model_id: String,
    /// Preprocessing configuration for the processor handle
    pub preprocessing: PreprocessingConfig,
    /// Loading-progress reporting granularity
    pub progress_granularity: ProgressGranularity,
}

impl WorkerConfig {
    /// Create a new worker configuration builder
    #[must_use]
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::new()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            preprocessing: PreprocessingConfig::default(),
            progress_granularity: ProgressGranularity::Fine,
        }
    }
}

/// Builder for `WorkerConfig`
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: WorkerConfig::default(),
        }
    }

    #[must_use]
    pub fn model_id<S: Into<String>>(mut self, model_id: S) -> Self {
        self.config.model_id = model_id.into();
        self
    }

    #[must_use]
    pub fn preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.config.preprocessing = preprocessing;
        self
    }

    #[must_use]
    pub fn progress_granularity(mut self, granularity: ProgressGranularity) -> Self {
        self.config.progress_granularity = granularity;
        self
    }

    /// Build the worker configuration
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::InvalidConfig` for:
    /// - Empty model identifier
    /// - Zero target size
    /// - Non-positive rescale factor
    /// - Zero entries in the normalization standard deviation
    pub fn build(self) -> Result<WorkerConfig> {
        if self.config.model_id.trim().is_empty() {
            return Err(WorkerError::invalid_config("Model identifier is empty"));
        }
        let [width, height] = self.config.preprocessing.target_size;
        if width == 0 || height == 0 {
            return Err(WorkerError::invalid_config(format!(
                "Invalid target size {width}x{height}: dimensions must be non-zero"
            )));
        }
        if self.config.preprocessing.rescale_factor <= 0.0 {
            return Err(WorkerError::invalid_config(
                "Rescale factor must be positive",
            ));
        }
        if self
            .config
            .preprocessing
            .normalization_std
            .iter()
            .any(|&std| std == 0.0)
        {
            return Err(WorkerError::invalid_config(
                "Normalization standard deviation must be non-zero",
            ));
        }

        Ok(self.config)
    }
}

impl Default for WorkerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
