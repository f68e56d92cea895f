//! Pipeline error type
//!
//! Every stage returns `Result<_, PipelineError>`; the orchestrator turns the
//! error into a failure [`Outcome`](crate::Outcome) at the boundary.

use crate::models::ErrorKind;

/// Failure raised by a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// No frame was supplied
    #[error("frame is missing: {0}")]
    InvalidFrame(String),

    /// Metadata or payload missing or malformed
    #[error("invalid frame data: {0}")]
    InvalidData(String),

    /// Pixel conversion failed
    #[error("frame conversion failed: {0}")]
    ConversionError(String),

    /// Decoder failure or unexpected internal failure
    #[error("code detection failed: {0}")]
    DetectionError(String),

    /// The decoder has been released
    #[error("detector is closed")]
    DetectorClosed,
}

impl PipelineError {
    /// Failure classification reported to callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidFrame(_) => ErrorKind::InvalidFrame,
            PipelineError::InvalidData(_) => ErrorKind::InvalidData,
            PipelineError::ConversionError(_) => ErrorKind::ConversionError,
            PipelineError::DetectionError(_) => ErrorKind::DetectionError,
            PipelineError::DetectorClosed => ErrorKind::DetectorClosed,
        }
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::ConversionError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            PipelineError::InvalidFrame(String::new()).kind(),
            ErrorKind::InvalidFrame
        );
        assert_eq!(PipelineError::DetectorClosed.kind(), ErrorKind::DetectorClosed);
        assert_eq!(
            PipelineError::DetectionError("boom".into()).to_string(),
            "code detection failed: boom"
        );
    }
}
