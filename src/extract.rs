//! Frame extraction from a bridge-shaped frame description
//!
//! The capture layer hands frames over as a JSON-like map:
//!
//! ```json
//! { "width": 640, "height": 480, "format": 17, "orientation": "portrait",
//!   "data": { "bytes": [ ... ] } }
//! ```
//!
//! Depending on the capture library version the pixel payload sits either
//! under `data.bytes` or directly under `buffer`.

use crate::error::PipelineError;
use crate::models::{FrameDescriptor, Orientation, PixelFormat};
use bytes::Bytes;
use serde_json::{Map, Value};

/// Where the pixel payload was found
#[derive(Debug, Clone, Copy)]
enum PayloadShape<'a> {
    /// `{"data": {"bytes": [..]}}`
    Nested(&'a Value),
    /// `{"buffer": [..]}`
    Flat(&'a Value),
}

impl<'a> PayloadShape<'a> {
    fn locate(frame: &'a Map<String, Value>) -> Option<Self> {
        let present = |v: &&Value| !v.is_null();
        frame
            .get("data")
            .and_then(|data| data.get("bytes"))
            .filter(present)
            .map(PayloadShape::Nested)
            .or_else(|| frame.get("buffer").filter(present).map(PayloadShape::Flat))
    }

    fn label(&self) -> &'static str {
        match self {
            PayloadShape::Nested(_) => "data.bytes",
            PayloadShape::Flat(_) => "buffer",
        }
    }

    fn value(&self) -> &'a Value {
        match self {
            PayloadShape::Nested(v) | PayloadShape::Flat(v) => v,
        }
    }

    fn to_bytes(self) -> Result<Bytes, PipelineError> {
        let items = self.value().as_array().ok_or_else(|| {
            PipelineError::InvalidData(format!("{} is not an array", self.label()))
        })?;

        let mut bytes = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let byte = narrow_to_byte(item).ok_or_else(|| {
                PipelineError::InvalidData(format!(
                    "{}[{}] is not a number",
                    self.label(),
                    i
                ))
            })?;
            bytes.push(byte);
        }
        Ok(Bytes::from(bytes))
    }
}

/// Two's-complement narrowing: both -1 and 255 become 0xFF
fn narrow_to_byte(value: &Value) -> Option<u8> {
    if let Some(n) = value.as_i64() {
        return Some(n as u8);
    }
    if let Some(n) = value.as_u64() {
        return Some(n as u8);
    }
    value.as_f64().map(|f| f as i64 as u8)
}

fn integer_field(frame: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = frame.get(key)?;
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn dimension_field(frame: &Map<String, Value>, key: &str) -> Result<u32, PipelineError> {
    integer_field(frame, key)
        .filter(|&v| v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| PipelineError::InvalidData(format!("{} must be a positive integer", key)))
}

/// Pull a [`FrameDescriptor`] out of a frame description
///
/// `None` and JSON `null` fail with `InvalidFrame` before anything is read.
/// A missing payload, a non-numeric payload element, bad dimensions or a
/// missing format code fail with `InvalidData`.
pub fn extract_frame(frame: Option<&Value>) -> Result<FrameDescriptor, PipelineError> {
    let frame = match frame {
        None | Some(Value::Null) => {
            return Err(PipelineError::InvalidFrame("no frame supplied".to_string()));
        }
        Some(frame) => frame.as_object().ok_or_else(|| {
            PipelineError::InvalidData("frame description is not an object".to_string())
        })?,
    };

    let width = dimension_field(frame, "width")?;
    let height = dimension_field(frame, "height")?;
    let format = integer_field(frame, "format")
        .map(PixelFormat::from_code)
        .ok_or_else(|| PipelineError::InvalidData("format code is missing".to_string()))?;
    let orientation = frame
        .get("orientation")
        .and_then(Value::as_str)
        .map(Orientation::from_name)
        .unwrap_or_default();

    let payload = PayloadShape::locate(frame).ok_or_else(|| {
        log::warn!("frame description carries neither data.bytes nor buffer");
        PipelineError::InvalidData("frame has no pixel payload".to_string())
    })?;
    let bytes = payload.to_bytes()?;

    log::debug!(
        "extracted {}x{} {} frame ({} bytes via {}, orientation {})",
        width,
        height,
        format,
        bytes.len(),
        payload.label(),
        orientation.name()
    );

    Ok(FrameDescriptor {
        width,
        height,
        format,
        orientation,
        bytes,
    })
}
