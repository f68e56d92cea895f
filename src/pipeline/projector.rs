use crate::models::{Bounds, DetectionResult, RawDetection};

/// Project a decoder detection onto the original frame
///
/// The payload prefers the raw value over the display value. Geometry is
/// clipped to the frame and expressed both in pixels and as fractions of the
/// original `frame_width` x `frame_height` (not the rotated image size).
pub fn project(detection: &RawDetection, frame_width: u32, frame_height: u32) -> DetectionResult {
    let value = detection
        .raw_value
        .clone()
        .or_else(|| detection.display_value.clone());

    let bounds = detection
        .bounding_box
        .and_then(|rect| {
            let clipped = rect.clip_to(frame_width, frame_height);
            if clipped != Some(rect) {
                log::debug!(
                    "bounding box {:?} clipped to {}x{} frame: {:?}",
                    rect,
                    frame_width,
                    frame_height,
                    clipped
                );
            }
            clipped
        })
        .map(|rect| {
            let (fw, fh) = (frame_width as f64, frame_height as f64);
            Bounds {
                rect: Some(rect),
                origin: Some([rect.x as f64 / fw, rect.y as f64 / fh]),
                size: Some([rect.width as f64 / fw, rect.height as f64 / fh]),
            }
        })
        .unwrap_or_default();

    DetectionResult { value, bounds }
}
