//! Decoder contract
//!
//! A decoder receives a [`NormalizedImage`] and answers later, from any thread,
//! through the [`Reply`] it was handed. The pipeline never blocks on it.
//!
//! `Reply` is cloneable so a decoder can move it onto its worker, but only
//! the first `succeed`/`fail` call takes effect. Later calls are logged and
//! dropped.

/// Decoder backed by the `rqrr` crate
pub mod rqrr_backend;

use crate::models::RawDetection;
use crate::normalize::{NativeFormat, NormalizedImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

pub use rqrr_backend::RqrrDecoder;

/// What a decoder reports: every detection in its own order, or a failure message
pub type DecodeResult = Result<Vec<RawDetection>, String>;

/// External capability that locates and reads codes
pub trait CodeDecoder: Send + Sync {
    /// Start decoding `image`. Must return without waiting for the result;
    /// the answer goes through `reply`.
    fn process(&self, image: NormalizedImage, reply: Reply);

    /// Whether YUV data in `format` can be passed without conversion
    fn accepts_native(&self, format: NativeFormat) -> bool {
        let _ = format;
        true
    }

    /// Release decoder resources. Called at most once by the pipeline.
    fn close(&self) {}
}

impl<T: CodeDecoder + ?Sized> CodeDecoder for Arc<T> {
    fn process(&self, image: NormalizedImage, reply: Reply) {
        (**self).process(image, reply)
    }

    fn accepts_native(&self, format: NativeFormat) -> bool {
        (**self).accepts_native(format)
    }

    fn close(&self) {
        (**self).close()
    }
}

impl<T: CodeDecoder + ?Sized> CodeDecoder for Box<T> {
    fn process(&self, image: NormalizedImage, reply: Reply) {
        (**self).process(image, reply)
    }

    fn accepts_native(&self, format: NativeFormat) -> bool {
        (**self).accepts_native(format)
    }

    fn close(&self) {
        (**self).close()
    }
}

struct ReplySlot {
    resolved: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<DecodeResult>>>,
}

/// Single-resolution answer channel handed to a decoder
#[derive(Clone)]
pub struct Reply {
    slot: Arc<ReplySlot>,
}

impl Reply {
    /// Create a reply handle and the receiver the pipeline waits on
    pub(crate) fn channel() -> (Self, oneshot::Receiver<DecodeResult>) {
        let (tx, rx) = oneshot::channel();
        let reply = Self {
            slot: Arc::new(ReplySlot {
                resolved: AtomicBool::new(false),
                sender: Mutex::new(Some(tx)),
            }),
        };
        (reply, rx)
    }

    /// Report detections. Returns false if this request was already answered.
    pub fn succeed(&self, detections: Vec<RawDetection>) -> bool {
        self.resolve(Ok(detections))
    }

    /// Report a failure. Returns false if this request was already answered.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.resolve(Err(message.into()))
    }

    /// True once `succeed` or `fail` has been called on any clone
    pub fn is_resolved(&self) -> bool {
        self.slot.resolved.load(Ordering::Acquire)
    }

    fn resolve(&self, result: DecodeResult) -> bool {
        if self
            .slot
            .resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!(
                "decoder answered the same request twice; ignoring {}",
                if result.is_ok() { "success" } else { "failure" }
            );
            return false;
        }

        let sender = self
            .slot
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = sender {
            if tx.send(result).is_err() {
                log::debug!("detection finished after the caller stopped waiting");
            }
        }
        true
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
