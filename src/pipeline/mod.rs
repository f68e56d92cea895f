//! Detection pipeline orchestrator
//!
//! One invocation walks
//! `Idle -> Extracting -> Normalizing -> Detecting -> Projecting -> Resolved`.
//! A failure in any stage jumps straight to `Resolved` with a failure outcome.
//! The decoder reply is the only await point, and every invocation produces
//! exactly one [`Outcome`].

/// Decoder ownership and request submission
pub mod invoker;
/// Raw detection to output record projection
pub mod projector;

#[cfg(test)]
mod tests;

pub use invoker::{DetectionInvoker, PendingDetection};
pub use projector::project;

use crate::config::PipelineConfig;
use crate::engine::{CodeDecoder, RqrrDecoder};
use crate::error::PipelineError;
use crate::extract::extract_frame;
use crate::models::{DetectionResult, FrameDescriptor, Outcome};
use crate::normalize::FormatNormalizer;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};

/// Progress of a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Not started
    Idle,
    /// Reading the frame description
    Extracting,
    /// Converting pixels for the decoder
    Normalizing,
    /// Waiting for the decoder
    Detecting,
    /// Mapping the first detection onto the frame
    Projecting,
    /// Outcome produced
    Resolved,
}

/// Per-invocation bookkeeping. `resolve` consumes it, so an invocation resolves once.
struct Invocation {
    id: u64,
    stage: Stage,
}

impl Invocation {
    fn enter(&mut self, stage: Stage) {
        log::debug!("detect #{}: {:?} -> {:?}", self.id, self.stage, stage);
        self.stage = stage;
    }

    fn resolve(mut self, result: Result<Option<DetectionResult>, PipelineError>) -> Outcome {
        let failed_in = self.stage;
        self.enter(Stage::Resolved);
        match result {
            Ok(result) => Outcome::Success { result },
            Err(err) => {
                log::warn!("detect #{} failed while {:?}: {}", self.id, failed_in, err);
                err.into()
            }
        }
    }
}

/// Run a synchronous stage, turning a panic into `DetectionError`
fn contained<T, F>(stage: Stage, work: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError>,
{
    catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
        let message = invoker::panic_message(payload.as_ref());
        log::error!("panicked while {:?}: {}", stage, message);
        Err(PipelineError::DetectionError(format!(
            "internal failure while {:?}: {}",
            stage, message
        )))
    })
}

/// Frame-to-outcome detection pipeline
///
/// Owns its decoder: [`close`](Self::close) (or dropping the pipeline)
/// releases it, after which every call resolves `DetectorClosed`.
/// `detect` takes `&self`, so one pipeline can serve concurrent invocations.
///
/// # Example
/// ```no_run
/// use qr_frame::{Pipeline, PipelineConfig};
/// use serde_json::json;
///
/// # async fn run() -> Result<(), qr_frame::PipelineError> {
/// let pipeline = Pipeline::with_rqrr(PipelineConfig::from_env())?;
/// let frame = json!({
///     "width": 2, "height": 2, "format": 17, "orientation": "portrait",
///     "buffer": [0, 0, 0, 0, 128, 128]
/// });
/// let outcome = pipeline.detect(Some(&frame)).await;
/// println!("{}", serde_json::to_string(&outcome).unwrap_or_default());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Pipeline {
    normalizer: FormatNormalizer,
    invoker: DetectionInvoker,
    next_id: AtomicU64,
}

impl Pipeline {
    /// Pipeline over `decoder` with default configuration
    pub fn new<D: CodeDecoder + 'static>(decoder: D) -> Self {
        Self::with_config(decoder, PipelineConfig::default())
    }

    /// Pipeline over `decoder` with `config`
    pub fn with_config<D: CodeDecoder + 'static>(decoder: D, config: PipelineConfig) -> Self {
        Self {
            normalizer: FormatNormalizer::new(config),
            invoker: DetectionInvoker::new(decoder),
            next_id: AtomicU64::new(1),
        }
    }

    /// Pipeline over the bundled `rqrr` decoder
    pub fn with_rqrr(config: PipelineConfig) -> Result<Self, PipelineError> {
        let decoder = RqrrDecoder::with_threads(config.decode_threads)?;
        Ok(Self::with_config(decoder, config))
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        self.normalizer.config()
    }

    /// Detect a code in a bridge-shaped frame description
    ///
    /// `None` or JSON `null` resolves `InvalidFrame` without reading anything.
    pub async fn detect(&self, frame: Option<&Value>) -> Outcome {
        let mut invocation = self.begin();
        let result = self.detect_described(&mut invocation, frame).await;
        invocation.resolve(result)
    }

    /// Detect a code in an already extracted frame
    pub async fn detect_frame(&self, frame: FrameDescriptor) -> Outcome {
        let mut invocation = self.begin();
        let result = self.run(&mut invocation, frame).await;
        invocation.resolve(result)
    }

    /// Release the decoder. Returns true on the first call only.
    pub fn close(&self) -> bool {
        self.invoker.close()
    }

    /// True once the decoder has been released
    pub fn is_closed(&self) -> bool {
        self.invoker.is_closed()
    }

    fn begin(&self) -> Invocation {
        Invocation {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            stage: Stage::Idle,
        }
    }

    async fn detect_described(
        &self,
        invocation: &mut Invocation,
        frame: Option<&Value>,
    ) -> Result<Option<DetectionResult>, PipelineError> {
        if self.is_closed() {
            return Err(PipelineError::DetectorClosed);
        }
        invocation.enter(Stage::Extracting);
        let frame = contained(Stage::Extracting, || extract_frame(frame))?;
        self.run(invocation, frame).await
    }

    async fn run(
        &self,
        invocation: &mut Invocation,
        frame: FrameDescriptor,
    ) -> Result<Option<DetectionResult>, PipelineError> {
        if self.is_closed() {
            return Err(PipelineError::DetectorClosed);
        }

        invocation.enter(Stage::Normalizing);
        let image = contained(Stage::Normalizing, || {
            self.normalizer
                .normalize(&frame, |format| self.invoker.accepts_native(format))
        })?;

        invocation.enter(Stage::Detecting);
        let detections = self.invoker.submit(image)?.wait().await?;

        invocation.enter(Stage::Projecting);
        let Some(first) = detections.first() else {
            return Ok(None);
        };
        if detections.len() > 1 {
            log::debug!(
                "detect #{}: keeping first of {} detections",
                invocation.id,
                detections.len()
            );
        }
        contained(Stage::Projecting, || {
            Ok(Some(project(first, frame.width, frame.height)))
        })
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.invoker.close();
    }
}
