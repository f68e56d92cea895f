use super::DetectionResult;
use crate::error::PipelineError;
use serde::Serialize;
use std::fmt;

/// Closed set of failure codes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// No frame was supplied
    InvalidFrame,
    /// Frame metadata or pixel payload missing or unusable
    InvalidData,
    /// Re-encoding or decoding the pixel data failed
    ConversionError,
    /// The decoder failed, or an unexpected internal failure occurred
    DetectionError,
    /// The decoder has been released
    DetectorClosed,
}

impl ErrorKind {
    /// Stable string code, e.g. `"INVALID_DATA"`
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidFrame => "INVALID_FRAME",
            ErrorKind::InvalidData => "INVALID_DATA",
            ErrorKind::ConversionError => "CONVERSION_ERROR",
            ErrorKind::DetectionError => "DETECTION_ERROR",
            ErrorKind::DetectorClosed => "DETECTOR_CLOSED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Terminal result of one detection invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// The decoder ran; `result` is `None` when no code was found
    Success {
        /// First detected code, if any
        result: Option<DetectionResult>,
    },
    /// The invocation failed
    Failure {
        /// Failure classification
        code: ErrorKind,
        /// Human-readable description
        message: String,
    },
}

impl Outcome {
    /// Successful run that found nothing
    pub fn not_found() -> Self {
        Outcome::Success { result: None }
    }

    /// Successful run with a detection
    pub fn found(result: DetectionResult) -> Self {
        Outcome::Success {
            result: Some(result),
        }
    }

    /// Failed run
    pub fn failure(code: ErrorKind, message: impl Into<String>) -> Self {
        Outcome::Failure {
            code,
            message: message.into(),
        }
    }

    /// True for `Success`, including "nothing found"
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// The detection, if the run succeeded and found a code
    pub fn result(&self) -> Option<&DetectionResult> {
        match self {
            Outcome::Success { result } => result.as_ref(),
            Outcome::Failure { .. } => None,
        }
    }

    /// Failure classification, if the run failed
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { code, .. } => Some(*code),
        }
    }
}

impl From<PipelineError> for Outcome {
    fn from(err: PipelineError) -> Self {
        Outcome::Failure {
            code: err.kind(),
            message: err.to_string(),
        }
    }
}
