//! qr_frame - camera frame normalization and asynchronous QR detection
//!
//! Takes a frame handed over by a capture layer (dimensions, pixel format,
//! device orientation, raw bytes), normalizes it into something a code
//! decoder can consume, hands it to the decoder without blocking, and
//! resolves exactly one [`Outcome`] per frame: the first detected code with
//! its bounding box in pixels and as fractions of the frame, nothing found,
//! or a classified failure.

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Pipeline configuration (defaults and environment overrides)
pub mod config;
/// Decoder contract and the bundled `rqrr` decoder
pub mod engine;
/// Pipeline error type
pub mod error;
/// Frame extraction from bridge-shaped descriptions
pub mod extract;
/// Core data structures (frames, detections, outcomes)
pub mod models;
/// Format normalization (native YUV pass-through and bitmap fallback)
pub mod normalize;
/// Detection orchestration
pub mod pipeline;
/// Cooldown and duplicate suppression for continuous scanning
pub mod throttle;
/// Frame loading and dataset helpers for the CLI and benchmarks
pub mod tools;
/// Utility functions (orientation mapping, YUV conversion)
pub mod utils;

pub use config::PipelineConfig;
pub use engine::{CodeDecoder, DecodeResult, Reply, RqrrDecoder};
pub use error::PipelineError;
pub use extract::extract_frame;
pub use models::{
    Bounds, DetectionResult, ErrorKind, FrameDescriptor, Orientation, Outcome, PixelFormat,
    PixelRect, RawDetection, Rotation,
};
pub use normalize::{FormatNormalizer, ImageData, NativeFormat, NormalizedImage};
pub use pipeline::{DetectionInvoker, PendingDetection, Pipeline, Stage, project};
pub use throttle::ScanGate;
pub use utils::orientation::rotation_for;
