use crate::engine::{CodeDecoder, DecodeResult, Reply};
use crate::error::PipelineError;
use crate::models::RawDetection;
use crate::normalize::{NativeFormat, NormalizedImage};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;

/// Owns the decoder and submits images to it
///
/// Closing is idempotent. Once closed, submissions fail with `DetectorClosed`.
pub struct DetectionInvoker {
    decoder: Box<dyn CodeDecoder>,
    closed: AtomicBool,
}

/// A submitted request whose reply has not been awaited yet
#[derive(Debug)]
pub struct PendingDetection {
    rx: oneshot::Receiver<DecodeResult>,
}

impl PendingDetection {
    /// Wait for the decoder's answer
    ///
    /// A decoder that drops every clone of its reply without answering yields
    /// `DetectionError` rather than waiting forever.
    pub async fn wait(self) -> Result<Vec<RawDetection>, PipelineError> {
        match self.rx.await {
            Ok(Ok(detections)) => Ok(detections),
            Ok(Err(message)) => {
                log::error!("decoder reported failure: {}", message);
                Err(PipelineError::DetectionError(message))
            }
            Err(_) => Err(PipelineError::DetectionError(
                "decoder dropped the request without answering".to_string(),
            )),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl DetectionInvoker {
    /// Take ownership of `decoder`
    pub fn new<D: CodeDecoder + 'static>(decoder: D) -> Self {
        Self {
            decoder: Box::new(decoder),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether the decoder takes `format` without conversion
    pub fn accepts_native(&self, format: NativeFormat) -> bool {
        self.decoder.accepts_native(format)
    }

    /// Hand `image` to the decoder. Returns as soon as the decoder has taken it.
    ///
    /// A panic inside the decoder's `process` resolves the request as a
    /// `DetectionError` unless the decoder had already answered.
    pub fn submit(&self, image: NormalizedImage) -> Result<PendingDetection, PipelineError> {
        if self.is_closed() {
            return Err(PipelineError::DetectorClosed);
        }

        let (reply, rx) = Reply::channel();
        let guard = reply.clone();
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.decoder.process(image, reply)))
        {
            let message = panic_message(payload.as_ref());
            log::error!("decoder panicked while accepting a request: {}", message);
            guard.fail(format!("decoder panicked: {}", message));
        }

        Ok(PendingDetection { rx })
    }

    /// Release the decoder. Returns true on the first call only.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.decoder.close();
        log::debug!("detector released");
        true
    }

    /// True after [`close`](Self::close)
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DetectionInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionInvoker")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
