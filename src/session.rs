//! Session lifecycle management
//!
//! The session is the paired model/processor handle set required to run
//! inference: a scarce, expensive-to-create shared resource. Exactly one
//! pair exists per worker; it is created lazily on first use, and the pair
//! is set and cleared atomically so a half-initialized session is never
//! observable across an initialization pass.

use crate::config::{ProgressGranularity, WorkerConfig};
use crate::error::{Result, WorkerError};
use crate::events::{EventSink, WorkerEvent};
use crate::runtime::InferenceRuntime;
use instant::Instant;
use tracing::{debug, info};

/// Owns the model/processor handle pair and its lazy initialization
pub struct SessionManager<R: InferenceRuntime> {
    model: Option<R::Model>,
    processor: Option<R::Processor>,
}

impl<R: InferenceRuntime> SessionManager<R> {
    /// Create a manager with no session
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: None,
            processor: None,
        }
    }

    /// Whether both handles are present
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.model.is_some() && self.processor.is_some()
    }

    /// Unconditionally clear both handles. Idempotent.
    pub fn invalidate(&mut self) {
        self.model = None;
        self.processor = None;
    }

    /// Borrow both handles for one inference pass
    ///
    /// # Errors
    /// Returns `WorkerError::Processing` when the session is absent;
    /// callers run `ensure_session` first.
    pub fn handles_mut(&mut self) -> Result<(&mut R::Model, &mut R::Processor)> {
        match (self.model.as_mut(), self.processor.as_mut()) {
            (Some(model), Some(processor)) => Ok((model, processor)),
            _ => Err(WorkerError::processing("Session not initialized")),
        }
    }

    /// Lazily initialize the handle pair, emitting `LoadingProgress` events
    /// and a final `ModelLoaded` on success.
    ///
    /// A no-op when the session already exists. On failure both handles are
    /// left absent and the error is returned for the caller to surface; a
    /// later call retries from scratch.
    ///
    /// # Errors
    /// Returns `WorkerError::Initialization` when either handle acquisition
    /// fails.
    pub async fn ensure_session(
        &mut self,
        runtime: &mut R,
        config: &WorkerConfig,
        events: &EventSink,
    ) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }
        // A partial pair never survives an initialization pass
        self.invalidate();

        debug!(model_id = %config.model_id, "initializing inference session");
        let started = Instant::now();
        let mut progress = InitProgress::new(config.progress_granularity, events.clone());

        progress.boundary(0, "loading model");
        let model = runtime
            .load_model(&config.model_id, &mut |pct, stage| {
                progress.forward(0, 50, pct, stage);
            })
            .await
            .map_err(as_init_error)?;

        progress.boundary(50, "loading processor");
        let processor = runtime
            .load_processor(&config.model_id, &config.preprocessing, &mut |pct, stage| {
                progress.forward(50, 100, pct, stage);
            })
            .await
            .map_err(as_init_error)?;

        progress.boundary(100, "session ready");
        self.model = Some(model);
        self.processor = Some(processor);
        events.emit(WorkerEvent::ModelLoaded);
        info!(
            model_id = %config.model_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "inference session initialized"
        );
        Ok(())
    }
}

impl<R: InferenceRuntime> Default for SessionManager<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn as_init_error(error: WorkerError) -> WorkerError {
    match error {
        err @ WorkerError::Initialization(_) => err,
        err => WorkerError::initialization(err.to_string()),
    }
}

/// Emits `LoadingProgress` events with a monotonically non-decreasing
/// percentage for one initialization pass
struct InitProgress {
    granularity: ProgressGranularity,
    last: u8,
    events: EventSink,
}

impl InitProgress {
    fn new(granularity: ProgressGranularity, events: EventSink) -> Self {
        Self {
            granularity,
            last: 0,
            events,
        }
    }

    /// Report a stage boundary; emitted for both granularities
    fn boundary(&mut self, progress: u8, stage: &str) {
        self.report(progress, stage);
    }

    /// Forward a runtime progress callback, rescaled into the stage's
    /// percentage segment; emitted only at fine granularity
    fn forward(&mut self, lo: u8, hi: u8, pct: u8, stage: &str) {
        if self.granularity != ProgressGranularity::Fine {
            return;
        }
        let span = u16::from(hi - lo);
        let scaled = lo + ((span * u16::from(pct.min(100))) / 100) as u8;
        self.report(scaled, stage);
    }

    fn report(&mut self, progress: u8, stage: &str) {
        let progress = progress.min(100).max(self.last);
        self.last = progress;
        self.events.emit(WorkerEvent::LoadingProgress {
            progress,
            stage: stage.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRuntime;
    use tokio::sync::mpsc;

    fn sink() -> (EventSink, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink::new(tx), rx)
    }

    fn collect(rx: &mut mpsc::UnboundedReceiver<WorkerEvent>) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_ensure_session_is_lazy_and_idempotent() {
        let mut runtime = MockRuntime::new();
        let probe = runtime.probe();
        let config = WorkerConfig::default();
        let (events, mut rx) = sink();
        let mut session = SessionManager::new();

        assert!(!session.is_ready());
        session
            .ensure_session(&mut runtime, &config, &events)
            .await
            .unwrap();
        assert!(session.is_ready());
        assert_eq!(probe.model_loads(), 1);

        // Second call is a no-op: no handle loads, no events
        collect(&mut rx);
        session
            .ensure_session(&mut runtime, &config, &events)
            .await
            .unwrap();
        assert_eq!(probe.model_loads(), 1);
        assert!(collect(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_precedes_model_loaded() {
        let mut runtime = MockRuntime::new();
        let config = WorkerConfig::default();
        let (events, mut rx) = sink();
        let mut session = SessionManager::new();

        session
            .ensure_session(&mut runtime, &config, &events)
            .await
            .unwrap();

        let emitted = collect(&mut rx);
        let mut last = 0;
        let mut saw_loaded = false;
        for event in emitted {
            match event {
                WorkerEvent::LoadingProgress { progress, .. } => {
                    assert!(!saw_loaded, "progress after modelLoaded");
                    assert!(progress >= last, "progress regressed");
                    assert!(progress <= 100);
                    last = progress;
                },
                WorkerEvent::ModelLoaded => saw_loaded = true,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(saw_loaded);
    }

    #[tokio::test]
    async fn test_coarse_granularity_emits_only_boundaries() {
        let mut runtime = MockRuntime::new();
        let config = WorkerConfig::builder()
            .progress_granularity(ProgressGranularity::Coarse)
            .build()
            .unwrap();
        let (events, mut rx) = sink();
        let mut session = SessionManager::new();

        session
            .ensure_session(&mut runtime, &config, &events)
            .await
            .unwrap();

        let progress: Vec<u8> = collect(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                WorkerEvent::LoadingProgress { progress, .. } => Some(progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn test_failed_initialization_leaves_both_handles_absent() {
        let mut runtime = MockRuntime::new();
        runtime.fail_processor_load("config fetch refused");
        let config = WorkerConfig::default();
        let (events, mut rx) = sink();
        let mut session = SessionManager::new();

        let err = session
            .ensure_session(&mut runtime, &config, &events)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Initialization(_)));
        assert!(!session.is_ready());
        // No ModelLoaded on the failure path
        assert!(!collect(&mut rx)
            .iter()
            .any(|event| matches!(event, WorkerEvent::ModelLoaded)));

        // Retry succeeds once the failure is cleared
        session
            .ensure_session(&mut runtime, &config, &events)
            .await
            .unwrap();
        assert!(session.is_ready());
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let mut session: SessionManager<MockRuntime> = SessionManager::new();
        session.invalidate();
        session.invalidate();
        assert!(!session.is_ready());
        assert!(session.handles_mut().is_err());
    }
}
